//! # Techcard Core
//!
//! Core business logic for the recipe technical-card service.
//!
//! This crate contains pure data operations and file management:
//! - Segmentation of recognised recipe text into title, ingredients and steps ([`parser`])
//! - Text recognition behind the [`ocr::TextRecognizer`] trait
//! - The append-only recipe store ([`store`])
//! - Technical-card rendering from the spreadsheet template ([`renderer`])
//! - Upload and generation orchestration ([`RecipeService`])
//!
//! **No API concerns**: HTTP servers and request/response types belong in `api-rest` and
//! `api-shared`.
//!
//! ## Storage layout
//!
//! ```text
//! <storage_dir>/
//! ├── images/
//! │   └── <id>.<ext>
//! ├── texts/
//! │   └── <id>.txt
//! ├── recipes.xlsx
//! └── tech_card_<id>.xlsx
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod ocr;
pub mod parser;
pub mod renderer;
pub mod service;
pub mod store;

pub use config::CoreConfig;
pub use constants::{DEFAULT_STORAGE_DIR, DEFAULT_TEMPLATE_PATH, XLSX_MIME_TYPE};
pub use error::{RecipeError, RecipeResult};
pub use ocr::{default_recognizer, OcrError, TextRecognizer};
pub use parser::{parse, ParsedRecipe};
pub use service::{GeneratedCard, ImageUpload, RecipeService, UploadOutcome};
pub use store::{RecipeRecord, RecipeStore};
pub use techcard_id::RecipeId;
