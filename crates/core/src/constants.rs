//! Constants used throughout the techcard core crate.
//!
//! This module contains all path, filename and cell-layout constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default directory for uploaded images, recognised texts, the recipe store and generated cards.
pub const DEFAULT_STORAGE_DIR: &str = "storage";

/// Default location of the technical-card template workbook.
pub const DEFAULT_TEMPLATE_PATH: &str = "excel_templates/tech_card_template.xlsx";

/// Default Tesseract language string (Estonian + English).
pub const DEFAULT_OCR_LANGUAGES: &str = "est+eng";

/// Default multipart upload limit: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Directory name (under the storage dir) for uploaded images.
pub const IMAGES_DIR_NAME: &str = "images";

/// Directory name (under the storage dir) for recognised texts.
pub const TEXTS_DIR_NAME: &str = "texts";

/// Filename of the recipe store workbook.
pub const RECIPES_FILENAME: &str = "recipes.xlsx";

/// Sheet holding one row per processed recipe.
pub const RECIPES_SHEET: &str = "recipes";

/// Header row of the recipe store.
pub const RECIPES_HEADER: [&str; 6] = ["id", "timestamp", "title", "text", "image_path", "text_path"];

/// Prefix of generated technical-card filenames.
pub const TECH_CARD_PREFIX: &str = "tech_card_";

/// Extension of generated technical cards.
pub const TECH_CARD_EXTENSION: &str = ".xlsx";

/// MIME type served for technical-card downloads.
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Extension used for uploaded images whose filename has none.
pub const DEFAULT_IMAGE_EXTENSION: &str = ".jpg";

/// Title stored for an upload whose text yields no title.
pub const FALLBACK_TITLE: &str = "Retsept";

/// Template cell receiving the recipe title.
pub const TITLE_CELL: &str = "B2";

/// Template cell receiving the ingredient list.
pub const INGREDIENTS_CELL: &str = "B5";

/// Template cell receiving the preparation steps.
pub const STEPS_CELL: &str = "B12";

/// Sheet name of a freshly initialised template.
pub const TEMPLATE_SHEET: &str = "Tehnoloogiline kaart";

/// Label cells written into a freshly initialised template.
pub const TEMPLATE_LABELS: [(&str, &str); 3] = [
    ("A2", "Nimi"),
    ("A5", "Koostisosad"),
    ("A12", "Valmistamine"),
];
