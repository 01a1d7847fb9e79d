//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_OCR_LANGUAGES, DEFAULT_STORAGE_DIR, DEFAULT_TEMPLATE_PATH,
    IMAGES_DIR_NAME, RECIPES_FILENAME, TEXTS_DIR_NAME,
};
use crate::{RecipeError, RecipeResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    storage_dir: PathBuf,
    template_path: PathBuf,
    ocr_languages: String,
    tessdata_dir: Option<PathBuf>,
    max_upload_bytes: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::InvalidInput` if the storage directory or the OCR language string
    /// is empty, or if the upload limit is zero.
    pub fn new(
        storage_dir: PathBuf,
        template_path: PathBuf,
        ocr_languages: String,
        tessdata_dir: Option<PathBuf>,
        max_upload_bytes: usize,
    ) -> RecipeResult<Self> {
        if storage_dir.as_os_str().is_empty() {
            return Err(RecipeError::InvalidInput(
                "storage_dir cannot be empty".into(),
            ));
        }
        if ocr_languages.trim().is_empty() {
            return Err(RecipeError::InvalidInput(
                "ocr_languages cannot be empty".into(),
            ));
        }
        if max_upload_bytes == 0 {
            return Err(RecipeError::InvalidInput(
                "max_upload_bytes must be greater than zero".into(),
            ));
        }

        Ok(Self {
            storage_dir,
            template_path,
            ocr_languages: ocr_languages.trim().to_string(),
            tessdata_dir,
            max_upload_bytes,
        })
    }

    /// Configuration with every value at its default, rooted at `storage_dir`.
    pub fn with_storage_dir(storage_dir: PathBuf) -> RecipeResult<Self> {
        Self::new(
            storage_dir,
            PathBuf::from(DEFAULT_TEMPLATE_PATH),
            DEFAULT_OCR_LANGUAGES.into(),
            None,
            DEFAULT_MAX_UPLOAD_BYTES,
        )
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn images_dir(&self) -> PathBuf {
        self.storage_dir.join(IMAGES_DIR_NAME)
    }

    pub fn texts_dir(&self) -> PathBuf {
        self.storage_dir.join(TEXTS_DIR_NAME)
    }

    pub fn recipes_path(&self) -> PathBuf {
        self.storage_dir.join(RECIPES_FILENAME)
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    pub fn ocr_languages(&self) -> &str {
        &self.ocr_languages
    }

    pub fn tessdata_dir(&self) -> Option<&Path> {
        self.tessdata_dir.as_deref()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Create the storage directory and its `images/` and `texts/` subdirectories.
    pub fn ensure_storage_layout(&self) -> RecipeResult<()> {
        for dir in [self.storage_dir.clone(), self.images_dir(), self.texts_dir()] {
            std::fs::create_dir_all(&dir).map_err(RecipeError::StorageDirCreation)?;
        }
        Ok(())
    }
}

/// Parse the upload limit from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default limit.
pub fn max_upload_bytes_from_env_value(value: Option<String>) -> RecipeResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(DEFAULT_MAX_UPLOAD_BYTES),
        Some(v) => v.parse::<usize>().map_err(|_| {
            RecipeError::InvalidInput(format!("upload limit must be a byte count, got: '{}'", v))
        }),
    }
}

/// Build a `CoreConfig` from raw environment values.
///
/// Binaries read the `TECHCARD_*` variables once and hand the raw values here; unset values fall
/// back to the defaults in [`crate::constants`].
pub fn core_config_from_env_values(
    storage_dir: Option<String>,
    template_path: Option<String>,
    ocr_languages: Option<String>,
    tessdata_dir: Option<String>,
    max_upload_bytes: Option<String>,
) -> RecipeResult<CoreConfig> {
    fn non_empty(value: Option<String>) -> Option<String> {
        value.filter(|v| !v.trim().is_empty())
    }

    CoreConfig::new(
        PathBuf::from(non_empty(storage_dir).unwrap_or_else(|| DEFAULT_STORAGE_DIR.into())),
        PathBuf::from(non_empty(template_path).unwrap_or_else(|| DEFAULT_TEMPLATE_PATH.into())),
        non_empty(ocr_languages).unwrap_or_else(|| DEFAULT_OCR_LANGUAGES.into()),
        non_empty(tessdata_dir).map(PathBuf::from),
        max_upload_bytes_from_env_value(max_upload_bytes)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_rejects_empty_values() {
        let empty_storage = CoreConfig::new(
            PathBuf::new(),
            PathBuf::from("t.xlsx"),
            "eng".into(),
            None,
            1,
        );
        assert!(matches!(empty_storage, Err(RecipeError::InvalidInput(_))));

        let empty_langs = CoreConfig::new(
            PathBuf::from("storage"),
            PathBuf::from("t.xlsx"),
            "  ".into(),
            None,
            1,
        );
        assert!(matches!(empty_langs, Err(RecipeError::InvalidInput(_))));

        let zero_limit = CoreConfig::new(
            PathBuf::from("storage"),
            PathBuf::from("t.xlsx"),
            "eng".into(),
            None,
            0,
        );
        assert!(matches!(zero_limit, Err(RecipeError::InvalidInput(_))));
    }

    #[test]
    fn test_derived_paths() {
        let cfg = CoreConfig::with_storage_dir(PathBuf::from("/data")).unwrap();

        assert_eq!(cfg.images_dir(), PathBuf::from("/data/images"));
        assert_eq!(cfg.texts_dir(), PathBuf::from("/data/texts"));
        assert_eq!(cfg.recipes_path(), PathBuf::from("/data/recipes.xlsx"));
        assert_eq!(cfg.template_path(), Path::new(DEFAULT_TEMPLATE_PATH));
        assert_eq!(cfg.ocr_languages(), "est+eng");
        assert_eq!(cfg.max_upload_bytes(), 20_971_520);
        assert!(cfg.tessdata_dir().is_none());
    }

    #[test]
    fn test_from_env_values_uses_defaults_for_unset_and_blank() {
        let cfg = core_config_from_env_values(None, Some("  ".into()), None, None, None).unwrap();

        assert_eq!(cfg.storage_dir(), Path::new(DEFAULT_STORAGE_DIR));
        assert_eq!(cfg.template_path(), Path::new(DEFAULT_TEMPLATE_PATH));
        assert_eq!(cfg.ocr_languages(), DEFAULT_OCR_LANGUAGES);
    }

    #[test]
    fn test_from_env_values_overrides() {
        let cfg = core_config_from_env_values(
            Some("/srv/cards".into()),
            Some("/srv/template.xlsx".into()),
            Some("eng".into()),
            Some("/usr/share/tessdata".into()),
            Some("1024".into()),
        )
        .unwrap();

        assert_eq!(cfg.storage_dir(), Path::new("/srv/cards"));
        assert_eq!(cfg.template_path(), Path::new("/srv/template.xlsx"));
        assert_eq!(cfg.ocr_languages(), "eng");
        assert_eq!(cfg.tessdata_dir(), Some(Path::new("/usr/share/tessdata")));
        assert_eq!(cfg.max_upload_bytes(), 1024);
    }

    #[test]
    fn test_max_upload_bytes_rejects_garbage() {
        assert!(max_upload_bytes_from_env_value(Some("lots".into())).is_err());
        assert_eq!(max_upload_bytes_from_env_value(Some(" ".into())).unwrap(), DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_ensure_storage_layout_creates_directories() {
        let temp = TempDir::new().unwrap();
        let cfg = CoreConfig::with_storage_dir(temp.path().join("storage")).unwrap();

        cfg.ensure_storage_layout().unwrap();
        cfg.ensure_storage_layout().unwrap();

        assert!(cfg.images_dir().is_dir());
        assert!(cfg.texts_dir().is_dir());
    }
}
