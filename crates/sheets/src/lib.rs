//! Spreadsheet workbooks
//!
//! Technical cards are produced by filling a spreadsheet template, and the recipe store is a
//! single spreadsheet. This crate is the only place that knows the xlsx container format.
//!
//! ## Scope
//!
//! - Read string and numeric cell values from any sheet (shared and inline strings)
//! - Write string values into specific cells, keeping each cell's existing style
//! - Append rows below the last populated row
//! - Leave every other part of the package untouched on save
//!
//! Formulas are not evaluated and cell types other than text are read back as their raw
//! stored value.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//! use techcard_sheets::{render_template, CellRef};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut cells = BTreeMap::new();
//! cells.insert("B2".parse::<CellRef>()?, "Pancakes".to_string());
//!
//! render_template(
//!     Path::new("excel_templates/tech_card_template.xlsx"),
//!     None,
//!     &cells,
//!     Path::new("storage/tech_card_abc123.xlsx"),
//! )?;
//! # Ok(())
//! # }
//! ```

mod cell;
mod sheet_xml;
mod workbook;

pub use cell::CellRef;
pub use sheet_xml::SheetRow;
pub use workbook::{render_template, Workbook};

/// Errors that can occur while reading or writing workbooks
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a readable zip container
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A package part is not well-formed XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// A part the workbook needs is absent
    #[error("Missing workbook part: {0}")]
    MissingPart(String),

    /// No sheet with the requested name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Invalid cell reference: {0}")]
    InvalidCellRef(String),

    /// A package part is not valid UTF-8
    #[error("Invalid UTF-8 in workbook part: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type for workbook operations
pub type SheetResult<T> = Result<T, SheetError>;
