//! Recipe upload and technical-card generation.
//!
//! [`RecipeService`] ties the pieces together: it validates uploads, runs recognition, stores the
//! image and the recognised text, records the recipe, and renders technical cards
//! from either supplied text or a stored recipe.
//!
//! All methods are synchronous. Recognition can take seconds, so async hosts should call
//! them from a blocking thread.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use techcard_id::RecipeId;

use crate::config::CoreConfig;
use crate::constants::DEFAULT_IMAGE_EXTENSION;
use crate::ocr::TextRecognizer;
use crate::parser::parse;
use crate::renderer::TechCardRenderer;
use crate::store::{RecipeRecord, RecipeStore};
use crate::{RecipeError, RecipeResult};

/// An uploaded image as received from the client.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Result of processing one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub id: RecipeId,
    pub text: String,
    pub title: String,
    pub image_path: PathBuf,
    pub saved_text_path: PathBuf,
}

/// Result of generating one technical card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCard {
    pub id: RecipeId,
    pub tech_card_path: PathBuf,
    /// Parsed title; empty when the text has none.
    pub title: String,
}

/// Upload and generation operations over one storage directory.
#[derive(Clone)]
pub struct RecipeService {
    cfg: Arc<CoreConfig>,
    recognizer: Arc<dyn TextRecognizer>,
    store: RecipeStore,
    renderer: TechCardRenderer,
}

impl RecipeService {
    /// Creates the service, preparing the storage layout and the recipe store.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directories or the store workbook cannot be created.
    pub fn new(cfg: Arc<CoreConfig>, recognizer: Arc<dyn TextRecognizer>) -> RecipeResult<Self> {
        cfg.ensure_storage_layout()?;
        let store = RecipeStore::open(cfg.recipes_path())?;
        let renderer = TechCardRenderer::new(cfg.template_path(), cfg.storage_dir());

        if !cfg.template_path().is_file() {
            tracing::warn!(
                "technical-card template not found at {}; card generation will fail until it exists",
                cfg.template_path().display()
            );
        }

        Ok(Self {
            cfg,
            recognizer,
            store,
            renderer,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Stores an uploaded image, recognises its text and records the recipe.
    ///
    /// # Errors
    ///
    /// - `RecipeError::InvalidInput` if the upload is not an image or is empty/too large.
    /// - `RecipeError::Ocr` if recognition fails.
    /// - `RecipeError::FileWrite` / `RecipeError::Sheet` if storing fails.
    pub fn upload_image(&self, upload: ImageUpload) -> RecipeResult<UploadOutcome> {
        validate_upload(&upload, self.cfg.max_upload_bytes())?;

        let text = self.recognizer.recognize(&upload.bytes)?;
        let parsed = parse(&text);
        let title = parsed.title_or_fallback().to_string();

        let id = RecipeId::new();
        let extension = image_extension(upload.filename.as_deref());
        let image_path = id.file_in(&self.cfg.images_dir(), "", &extension);
        let text_path = id.file_in(&self.cfg.texts_dir(), "", ".txt");

        let stored = fs::write(&image_path, &upload.bytes)
            .and_then(|()| fs::write(&text_path, &text))
            .map_err(RecipeError::FileWrite)
            .and_then(|()| {
                self.store.append(&RecipeRecord::new(
                    id.as_str(),
                    title.as_str(),
                    text.as_str(),
                    &image_path,
                    &text_path,
                ))
            });
        if let Err(e) = stored {
            remove_partial_upload(&[image_path.as_path(), text_path.as_path()]);
            return Err(e);
        }

        tracing::info!(id = %id, title = %title, "processed recipe upload");
        Ok(UploadOutcome {
            id,
            text,
            title,
            image_path,
            saved_text_path: text_path,
        })
    }

    /// Renders a technical card.
    ///
    /// The text comes from `text` when it is non-empty; otherwise, if `id` is given, from the
    /// stored recipe with that id. A missing `id` means a new one is generated.
    ///
    /// # Errors
    ///
    /// - `RecipeError::Id` if `id` is not a valid identifier.
    /// - `RecipeError::NotFound` / `RecipeError::MissingStore` if the stored recipe is needed
    ///   but cannot be found.
    /// - `RecipeError::MissingTemplate` if the template is absent.
    pub fn generate_card(&self, id: Option<&str>, text: Option<&str>) -> RecipeResult<GeneratedCard> {
        let supplied = id
            .filter(|s| !s.is_empty())
            .map(RecipeId::parse)
            .transpose()?;
        let supplied_text = text.filter(|t| !t.is_empty());

        let text = match (&supplied, supplied_text) {
            (Some(id), None) => {
                self.store
                    .find_by_id(id.as_str())?
                    .ok_or_else(|| RecipeError::NotFound(format!("recipe {} not found", id)))?
                    .text
            }
            (_, text) => text.unwrap_or_default().to_string(),
        };

        let id = supplied.unwrap_or_default();
        let parsed = parse(&text);
        let tech_card_path = self.renderer.render(&id, &parsed)?;

        Ok(GeneratedCard {
            id,
            tech_card_path,
            title: parsed.title,
        })
    }

    /// Path of a previously generated card.
    ///
    /// # Errors
    ///
    /// `RecipeError::Id` for an invalid id, `RecipeError::NotFound` if no card exists.
    pub fn card_path(&self, id: &str) -> RecipeResult<PathBuf> {
        let id = RecipeId::parse(id)?;
        self.renderer.card_path(&id)
    }

    pub fn list_recipes(&self) -> RecipeResult<Vec<RecipeRecord>> {
        self.store.list()
    }
}

/// Removes files written for an upload that was not recorded.
fn remove_partial_upload(paths: &[&Path]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("could not remove {}: {}", path.display(), e),
        }
    }
}

fn validate_upload(upload: &ImageUpload, max_bytes: usize) -> RecipeResult<()> {
    let is_image_type = upload
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"));
    if !is_image_type {
        return Err(RecipeError::InvalidInput(
            "please upload an image file".into(),
        ));
    }
    if upload.bytes.is_empty() {
        return Err(RecipeError::InvalidInput("uploaded file is empty".into()));
    }
    if upload.bytes.len() > max_bytes {
        return Err(RecipeError::InvalidInput(format!(
            "uploaded file exceeds {} bytes",
            max_bytes
        )));
    }
    if let Some(kind) = infer::get(&upload.bytes) {
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(RecipeError::InvalidInput(format!(
                "uploaded file is {}, not an image",
                kind.mime_type()
            )));
        }
    }
    Ok(())
}

/// Lowercased extension of the uploaded filename (with the dot), or `.jpg`.
fn image_extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_MAX_UPLOAD_BYTES;
    use crate::ocr::OcrError;
    use crate::renderer::write_blank_template;
    use tempfile::TempDir;
    use techcard_sheets::Workbook;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    struct FixedRecognizer(String);

    impl TextRecognizer for FixedRecognizer {
        fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
            Ok(self.0.clone())
        }
    }

    struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
            Err(OcrError::Engine("engine exploded".into()))
        }
    }

    fn config(temp: &TempDir) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(
                temp.path().join("storage"),
                temp.path().join("excel_templates").join("tech_card_template.xlsx"),
                "est+eng".into(),
                None,
                DEFAULT_MAX_UPLOAD_BYTES,
            )
            .unwrap(),
        )
    }

    fn service_with(temp: &TempDir, recognizer: Arc<dyn TextRecognizer>) -> RecipeService {
        let cfg = config(temp);
        write_blank_template(cfg.template_path(), false).unwrap();
        RecipeService::new(cfg, recognizer).unwrap()
    }

    fn service(temp: &TempDir, text: &str) -> RecipeService {
        service_with(temp, Arc::new(FixedRecognizer(text.into())))
    }

    fn png_upload(filename: Option<&str>) -> ImageUpload {
        ImageUpload {
            filename: filename.map(str::to_string),
            content_type: Some("image/png".into()),
            bytes: PNG_MAGIC.to_vec(),
        }
    }

    fn card_cell(path: &Path, row: u32) -> String {
        let workbook = Workbook::open(path).unwrap();
        let sheet = workbook.active_sheet().to_string();
        workbook
            .rows(&sheet)
            .unwrap()
            .into_iter()
            .find(|r| r.index == row)
            .map(|r| r.value(2).to_string())
            .unwrap_or_default()
    }

    #[test]
    fn test_new_prepares_storage_layout() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");

        assert!(service.config().images_dir().is_dir());
        assert!(service.config().texts_dir().is_dir());
        assert!(service.config().recipes_path().is_file());
    }

    #[test]
    fn test_upload_image_stores_everything() {
        let temp = TempDir::new().unwrap();
        let text = "Title: Pancakes\nKoostisosad:\nFlour\nValmistamine:\nFry";
        let service = service(&temp, text);

        let outcome = service.upload_image(png_upload(Some("Photo.PNG"))).unwrap();

        assert_eq!(outcome.title, "Pancakes");
        assert_eq!(outcome.text, text);
        assert_eq!(
            outcome.image_path,
            service.config().images_dir().join(format!("{}.png", outcome.id))
        );
        assert_eq!(fs::read(&outcome.image_path).unwrap(), PNG_MAGIC);
        assert_eq!(
            outcome.saved_text_path,
            service.config().texts_dir().join(format!("{}.txt", outcome.id))
        );
        assert_eq!(fs::read_to_string(&outcome.saved_text_path).unwrap(), text);

        let records = service.list_recipes().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, outcome.id.as_str());
        assert_eq!(records[0].title, "Pancakes");
        assert_eq!(records[0].text, text);
        assert_eq!(records[0].image_path, outcome.image_path.display().to_string());
    }

    #[test]
    fn test_upload_image_without_title_uses_fallback() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");

        let outcome = service.upload_image(png_upload(None)).unwrap();

        assert_eq!(outcome.title, "Retsept");
        assert_eq!(outcome.image_path.extension().unwrap(), "jpg");
        assert_eq!(service.list_recipes().unwrap()[0].title, "Retsept");
    }

    #[test]
    fn test_upload_image_rejects_non_image_content_type() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");

        for content_type in [None, Some("application/pdf"), Some("text/plain")] {
            let upload = ImageUpload {
                content_type: content_type.map(str::to_string),
                ..png_upload(Some("x.png"))
            };
            assert!(matches!(
                service.upload_image(upload),
                Err(RecipeError::InvalidInput(_))
            ));
        }
        assert!(service.list_recipes().unwrap().is_empty());
    }

    #[test]
    fn test_upload_image_rejects_empty_and_disguised_bodies() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");

        let empty = ImageUpload {
            bytes: Vec::new(),
            ..png_upload(Some("x.png"))
        };
        assert!(matches!(
            service.upload_image(empty),
            Err(RecipeError::InvalidInput(_))
        ));

        let pdf = ImageUpload {
            bytes: b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec(),
            ..png_upload(Some("x.png"))
        };
        assert!(matches!(
            service.upload_image(pdf),
            Err(RecipeError::InvalidInput(msg)) if msg.contains("not an image")
        ));
    }

    #[test]
    fn test_upload_image_accepts_unrecognised_bytes() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "Nimi: Kama");

        let upload = ImageUpload {
            filename: Some("scan.jpeg".into()),
            content_type: Some("image/jpeg".into()),
            bytes: b"raw scanner output".to_vec(),
        };

        assert_eq!(service.upload_image(upload).unwrap().title, "Kama");
    }

    #[test]
    fn test_upload_image_ocr_failure_records_nothing() {
        let temp = TempDir::new().unwrap();
        let service = service_with(&temp, Arc::new(FailingRecognizer));

        let result = service.upload_image(png_upload(Some("x.png")));

        assert!(matches!(result, Err(RecipeError::Ocr(OcrError::Engine(_)))));
        assert!(service.list_recipes().unwrap().is_empty());
        assert_eq!(fs::read_dir(service.config().images_dir()).unwrap().count(), 0);
        assert_eq!(fs::read_dir(service.config().texts_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_upload_image_without_engine_leaves_no_files() {
        let temp = TempDir::new().unwrap();
        let service = service_with(&temp, Arc::new(crate::ocr::UnavailableRecognizer));

        for _ in 0..3 {
            assert!(matches!(
                service.upload_image(png_upload(Some("x.png"))),
                Err(RecipeError::Ocr(OcrError::Unavailable(_)))
            ));
        }

        assert!(service.list_recipes().unwrap().is_empty());
        assert_eq!(fs::read_dir(service.config().images_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_upload_image_store_failure_removes_written_files() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "Title: Soup");
        fs::remove_file(service.config().recipes_path()).unwrap();

        let result = service.upload_image(png_upload(Some("x.png")));

        assert!(matches!(result, Err(RecipeError::MissingStore(_))));
        assert_eq!(fs::read_dir(service.config().images_dir()).unwrap().count(), 0);
        assert_eq!(fs::read_dir(service.config().texts_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(Some("photo.JPEG")), ".jpeg");
        assert_eq!(image_extension(Some("../../up/evil.Png")), ".png");
        assert_eq!(image_extension(Some("noext")), ".jpg");
        assert_eq!(image_extension(Some("weird.p g")), ".jpg");
        assert_eq!(image_extension(None), ".jpg");
    }

    #[test]
    fn test_generate_card_from_text() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");

        let card = service
            .generate_card(None, Some("Title: Pancakes\nKoostisosad:\nFlour\nMilk\nValmistamine:\nMix"))
            .unwrap();

        assert_eq!(card.title, "Pancakes");
        assert_eq!(
            card.tech_card_path,
            service
                .config()
                .storage_dir()
                .join(format!("tech_card_{}.xlsx", card.id))
        );
        assert_eq!(card_cell(&card.tech_card_path, 2), "Pancakes");
        assert_eq!(card_cell(&card.tech_card_path, 5), "Flour\nMilk");
        assert_eq!(card_cell(&card.tech_card_path, 12), "Mix");
    }

    #[test]
    fn test_generate_card_from_stored_recipe() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "Nimi: Kama\nKoostisosad: kama\nJuhend: sega");
        let upload = service.upload_image(png_upload(Some("kama.png"))).unwrap();

        for text in [None, Some("")] {
            let card = service
                .generate_card(Some(upload.id.as_str()), text)
                .unwrap();
            assert_eq!(card.id, upload.id);
            assert_eq!(card.title, "Kama");
            assert_eq!(card_cell(&card.tech_card_path, 12), "sega");
        }
    }

    #[test]
    fn test_generate_card_supplied_text_wins_over_store() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "Nimi: Stored");
        let upload = service.upload_image(png_upload(None)).unwrap();

        let card = service
            .generate_card(Some(upload.id.as_str()), Some("Nimi: Supplied"))
            .unwrap();

        assert_eq!(card.id, upload.id);
        assert_eq!(card.title, "Supplied");
    }

    #[test]
    fn test_generate_card_unknown_id_is_not_found() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");

        assert!(matches!(
            service.generate_card(Some("nope1234"), None),
            Err(RecipeError::NotFound(_))
        ));
    }

    #[test]
    fn test_generate_card_missing_store_is_reported() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");
        fs::remove_file(service.config().recipes_path()).unwrap();

        assert!(matches!(
            service.generate_card(Some("abc"), None),
            Err(RecipeError::MissingStore(_))
        ));
    }

    #[test]
    fn test_generate_card_rejects_invalid_id() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");

        assert!(matches!(
            service.generate_card(Some("../../etc/passwd"), Some("x")),
            Err(RecipeError::Id(_))
        ));
    }

    #[test]
    fn test_generate_card_without_anything_uses_new_id_and_empty_title() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");

        let card = service.generate_card(None, None).unwrap();
        let empty_id = service.generate_card(Some(""), None).unwrap();

        assert_eq!(card.title, "");
        assert!(card.tech_card_path.is_file());
        assert_ne!(card.id, empty_id.id);
    }

    #[test]
    fn test_generate_card_without_template_fails() {
        let temp = TempDir::new().unwrap();
        let service =
            RecipeService::new(config(&temp), Arc::new(FixedRecognizer(String::new()))).unwrap();

        assert!(matches!(
            service.generate_card(None, Some("Title: Soup")),
            Err(RecipeError::MissingTemplate(_))
        ));
    }

    #[test]
    fn test_card_path() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, "");

        assert!(matches!(service.card_path("abc"), Err(RecipeError::NotFound(_))));
        assert!(matches!(service.card_path("a/b"), Err(RecipeError::Id(_))));

        let card = service.generate_card(Some("abc"), Some("Title: Soup")).unwrap();
        assert_eq!(service.card_path("abc").unwrap(), card.tech_card_path);
    }
}
