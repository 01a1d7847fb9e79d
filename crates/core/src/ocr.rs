//! Optical character recognition.
//!
//! The rest of the crate only sees the [`TextRecognizer`] trait. The hosting process decides
//! which recogniser to build (see [`default_recognizer`]) and owns it for its lifetime; tests
//! substitute their own implementation.
//!
//! The Tesseract backend is only compiled with the `ocr` feature, which links against the
//! system `tesseract` and `leptonica` libraries.

use std::sync::Arc;

use thiserror::Error;

#[cfg(feature = "ocr")]
use std::path::PathBuf;

/// Errors raised while recognising text.
#[derive(Debug, Error)]
pub enum OcrError {
    /// No OCR engine is compiled into this build.
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// The bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The engine failed to initialise or to recognise the image.
    #[error("OCR engine failure: {0}")]
    Engine(String),
}

/// Recognises text in an encoded image (PNG, JPEG, ...).
///
/// Implementations are synchronous and may take seconds per image; async callers should run
/// them on a blocking thread.
pub trait TextRecognizer: Send + Sync {
    /// Returns the recognised text, one fragment per line.
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Stand-in used when the crate is built without the `ocr` feature.
#[derive(Debug, Default, Clone)]
pub struct UnavailableRecognizer;

impl TextRecognizer for UnavailableRecognizer {
    fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::Unavailable(
            "built without the `ocr` feature".into(),
        ))
    }
}

/// Joins the non-blank fragments of engine output with `\n`.
pub fn join_fragments<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fragments
        .into_iter()
        .filter_map(|f| {
            let f = f.as_ref().trim();
            (!f.is_empty()).then(|| f.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tesseract-backed recogniser.
///
/// A fresh engine is created per call, so one instance can serve concurrent requests.
#[cfg(feature = "ocr")]
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    languages: String,
    tessdata_dir: Option<PathBuf>,
}

#[cfg(feature = "ocr")]
impl TesseractRecognizer {
    pub fn new(languages: impl Into<String>, tessdata_dir: Option<PathBuf>) -> Self {
        Self {
            languages: languages.into(),
            tessdata_dir,
        }
    }
}

#[cfg(feature = "ocr")]
impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let decoded =
            image::load_from_memory(image).map_err(|e| OcrError::Decode(format!("{e}")))?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(OcrError::Decode("image has no pixels".into()));
        }

        // Leptonica reads encoded images; PNG keeps the decoded pixels lossless.
        let mut png = Vec::new();
        decoded
            .to_rgba8()
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| OcrError::Decode(format!("{e}")))?;

        let tessdata = self
            .tessdata_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string());
        let mut lt = leptess::LepTess::new(tessdata.as_deref(), &self.languages)
            .map_err(|e| OcrError::Engine(format!("{e}")))?;
        lt.set_image_from_mem(&png)
            .map_err(|e| OcrError::Engine(format!("{e}")))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| OcrError::Engine(format!("{e}")))?;

        tracing::debug!(chars = text.len(), "tesseract recognition finished");
        Ok(join_fragments(text.lines()))
    }
}

/// Builds the recogniser for this build.
///
/// With the `ocr` feature this is a [`TesseractRecognizer`] for `languages`; without it, an
/// [`UnavailableRecognizer`].
#[cfg(feature = "ocr")]
pub fn default_recognizer(
    languages: &str,
    tessdata_dir: Option<&std::path::Path>,
) -> Arc<dyn TextRecognizer> {
    Arc::new(TesseractRecognizer::new(
        languages,
        tessdata_dir.map(|p| p.to_path_buf()),
    ))
}

#[cfg(not(feature = "ocr"))]
pub fn default_recognizer(
    _languages: &str,
    _tessdata_dir: Option<&std::path::Path>,
) -> Arc<dyn TextRecognizer> {
    tracing::warn!("built without the `ocr` feature; image uploads will fail");
    Arc::new(UnavailableRecognizer)
}
