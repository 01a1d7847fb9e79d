#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("template workbook not found: {0}")]
    MissingTemplate(std::path::PathBuf),
    #[error("recipe store not found: {0}")]
    MissingStore(std::path::PathBuf),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),

    #[error("workbook error: {0}")]
    Sheet(#[from] techcard_sheets::SheetError),
    #[error("OCR error: {0}")]
    Ocr(#[from] crate::ocr::OcrError),
    #[error("identifier error: {0}")]
    Id(#[from] techcard_id::IdError),
}

pub type RecipeResult<T> = std::result::Result<T, RecipeError>;
