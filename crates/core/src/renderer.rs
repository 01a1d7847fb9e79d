//! Technical-card rendering.
//!
//! A technical card is a copy of the template workbook with the parsed title, ingredients and
//! steps written into fixed cells of its `Tehnoloogiline kaart` sheet, or of the active sheet
//! when the template has no sheet by that name. Cards are saved as
//! `tech_card_<id>.xlsx` in the storage directory; generating the same id again overwrites the
//! previous card.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use techcard_id::RecipeId;
use techcard_sheets::{render_template, CellRef, Workbook};

use crate::constants::{
    INGREDIENTS_CELL, STEPS_CELL, TECH_CARD_EXTENSION, TECH_CARD_PREFIX, TEMPLATE_LABELS,
    TEMPLATE_SHEET, TITLE_CELL,
};
use crate::parser::ParsedRecipe;
use crate::{RecipeError, RecipeResult};

/// Fills the technical-card template.
#[derive(Debug, Clone)]
pub struct TechCardRenderer {
    template_path: PathBuf,
    output_dir: PathBuf,
}

impl TechCardRenderer {
    pub fn new(template_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Where the card for `id` is (or would be) stored.
    pub fn output_path(&self, id: &RecipeId) -> PathBuf {
        id.file_in(&self.output_dir, TECH_CARD_PREFIX, TECH_CARD_EXTENSION)
    }

    /// Renders the card for `id` and returns its path.
    ///
    /// # Errors
    ///
    /// - `RecipeError::MissingTemplate` if the template file does not exist.
    /// - `RecipeError::Sheet` if the template cannot be read or the card cannot be written.
    pub fn render(&self, id: &RecipeId, recipe: &ParsedRecipe) -> RecipeResult<PathBuf> {
        if !self.template_path.is_file() {
            return Err(RecipeError::MissingTemplate(self.template_path.clone()));
        }

        let cells = card_cells(recipe)?;
        let output = self.output_path(id);
        let template = Workbook::open(&self.template_path)?;
        let sheet = if template.sheet_names().contains(&TEMPLATE_SHEET) {
            Some(TEMPLATE_SHEET)
        } else {
            tracing::warn!(
                "template {} has no sheet named {:?}; filling active sheet {:?}",
                self.template_path.display(),
                TEMPLATE_SHEET,
                template.active_sheet()
            );
            None
        };
        render_template(&self.template_path, sheet, &cells, &output)?;

        tracing::info!(id = %id, "rendered technical card {}", output.display());
        Ok(output)
    }

    /// Path of an existing card.
    ///
    /// # Errors
    ///
    /// `RecipeError::NotFound` if no card has been generated for `id`.
    pub fn card_path(&self, id: &RecipeId) -> RecipeResult<PathBuf> {
        let path = self.output_path(id);
        if path.is_file() {
            Ok(path)
        } else {
            Err(RecipeError::NotFound(format!(
                "technical card for id {} not found",
                id
            )))
        }
    }
}

/// Cell mapping written into the template for one recipe.
fn card_cells(recipe: &ParsedRecipe) -> RecipeResult<BTreeMap<CellRef, String>> {
    let mut cells = BTreeMap::new();
    for (cell, value) in [
        (TITLE_CELL, &recipe.title),
        (INGREDIENTS_CELL, &recipe.ingredients),
        (STEPS_CELL, &recipe.steps),
    ] {
        cells.insert(cell.parse::<CellRef>()?, value.clone());
    }
    Ok(cells)
}

/// Writes a minimal template with a label next to each filled cell.
///
/// # Errors
///
/// - `RecipeError::InvalidInput` if `path` exists and `force` is false.
/// - `RecipeError::StorageDirCreation` if the parent directory cannot be created.
pub fn write_blank_template(path: &Path, force: bool) -> RecipeResult<()> {
    if path.exists() && !force {
        return Err(RecipeError::InvalidInput(format!(
            "template already exists: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(RecipeError::StorageDirCreation)?;
    }

    let mut labels = BTreeMap::new();
    for (cell, label) in TEMPLATE_LABELS {
        labels.insert(cell.parse::<CellRef>()?, label.to_string());
    }

    let mut workbook = Workbook::blank(TEMPLATE_SHEET);
    workbook.set_cells(TEMPLATE_SHEET, &labels)?;
    workbook.save(path)?;
    tracing::info!("wrote blank technical-card template to {}", path.display());
    Ok(())
}
