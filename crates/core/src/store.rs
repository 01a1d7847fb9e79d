//! Recipe store.
//!
//! Every processed upload is appended as one row to the `recipes` sheet of `recipes.xlsx` in
//! the storage directory. The table is append-only: rows are never updated or deleted, and a
//! lookup by id returns the first matching row.
//!
//! Appending is a read-modify-write of the whole workbook, so all writers in the process are
//! serialised through one lock and every save replaces the file atomically.

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use techcard_sheets::{SheetRow, Workbook};

use crate::constants::{RECIPES_HEADER, RECIPES_SHEET};
use crate::{RecipeError, RecipeResult};

static WRITE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// One row of the recipe store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeRecord {
    pub id: String,
    /// UTC, RFC 3339.
    pub timestamp: String,
    pub title: String,
    pub text: String,
    pub image_path: String,
    pub text_path: String,
}

impl RecipeRecord {
    /// Creates a record stamped with the current UTC time.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        image_path: &Path,
        text_path: &Path,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            title: title.into(),
            text: text.into(),
            image_path: image_path.display().to_string(),
            text_path: text_path.display().to_string(),
        }
    }

    fn to_row(&self) -> [&str; 6] {
        [
            &self.id,
            &self.timestamp,
            &self.title,
            &self.text,
            &self.image_path,
            &self.text_path,
        ]
    }

    fn from_row(row: &SheetRow) -> Self {
        Self {
            id: row.value(1).to_string(),
            timestamp: row.value(2).to_string(),
            title: row.value(3).to_string(),
            text: row.value(4).to_string(),
            image_path: row.value(5).to_string(),
            text_path: row.value(6).to_string(),
        }
    }
}

/// The fields needed to regenerate a card for a stored recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecipe {
    pub title: String,
    pub text: String,
}

/// Append-only recipe table backed by a workbook on disk.
#[derive(Debug, Clone)]
pub struct RecipeStore {
    path: PathBuf,
}

impl RecipeStore {
    /// Opens the store at `path`, creating the workbook with its header row if it is absent.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::Sheet` if a new workbook cannot be written.
    pub fn open(path: impl Into<PathBuf>) -> RecipeResult<Self> {
        let store = Self { path: path.into() };
        store.initialise()?;
        Ok(store)
    }

    /// Handle to a store that may not exist yet; nothing is created on disk.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialise(&self) -> RecipeResult<()> {
        let _guard = WRITE_LOCK.lock();
        if self.path.exists() {
            return Ok(());
        }

        let mut workbook = Workbook::blank(RECIPES_SHEET);
        workbook.append_row(RECIPES_SHEET, &RECIPES_HEADER[..])?;
        workbook.save(&self.path)?;
        tracing::info!("created recipe store at {}", self.path.display());
        Ok(())
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// - `RecipeError::MissingStore` if the workbook was removed after the store was opened.
    /// - `RecipeError::Sheet` if the workbook cannot be read or written.
    pub fn append(&self, record: &RecipeRecord) -> RecipeResult<()> {
        let _guard = WRITE_LOCK.lock();
        let mut workbook = self.load()?;
        let row = workbook.append_row(RECIPES_SHEET, &record.to_row()[..])?;
        workbook.save(&self.path)?;
        tracing::info!(id = %record.id, row, "appended recipe to store");
        Ok(())
    }

    /// Looks up the first record with the given id.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if no row carries `id`.
    ///
    /// # Errors
    ///
    /// `RecipeError::MissingStore` if the workbook does not exist.
    pub fn find_by_id(&self, id: &str) -> RecipeResult<Option<StoredRecipe>> {
        Ok(self
            .data_rows()?
            .iter()
            .find(|row| row.value(1) == id)
            .map(|row| StoredRecipe {
                title: row.value(3).to_string(),
                text: row.value(4).to_string(),
            }))
    }

    /// All records in insertion order.
    pub fn list(&self) -> RecipeResult<Vec<RecipeRecord>> {
        Ok(self
            .data_rows()?
            .iter()
            .filter(|row| !row.value(1).is_empty())
            .map(RecipeRecord::from_row)
            .collect())
    }

    fn load(&self) -> RecipeResult<Workbook> {
        if !self.path.exists() {
            return Err(RecipeError::MissingStore(self.path.clone()));
        }
        Ok(Workbook::open(&self.path)?)
    }

    /// Rows below the header row.
    fn data_rows(&self) -> RecipeResult<Vec<SheetRow>> {
        let workbook = self.load()?;
        let rows = workbook.rows(RECIPES_SHEET)?;
        Ok(rows.into_iter().filter(|row| row.index > 1).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn record(id: &str, title: &str, text: &str) -> RecipeRecord {
        RecipeRecord::new(
            id,
            title,
            text,
            Path::new(&format!("storage/images/{id}.jpg")),
            Path::new(&format!("storage/texts/{id}.txt")),
        )
    }

    #[test]
    fn test_open_creates_workbook_with_header() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("recipes.xlsx");

        let store = RecipeStore::open(&path).unwrap();

        assert!(path.exists());
        let workbook = Workbook::open(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["recipes"]);
        let rows = workbook.rows("recipes").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, RECIPES_HEADER.to_vec());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_open_keeps_existing_rows() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("recipes.xlsx");
        RecipeStore::open(&path)
            .unwrap()
            .append(&record("a1", "Soup", "Title: Soup"))
            .unwrap();

        let reopened = RecipeStore::open(&path).unwrap();

        assert_eq!(reopened.list().unwrap().len(), 1);
    }

    #[test]
    fn test_append_then_find_and_list() {
        let temp = TempDir::new().unwrap();
        let store = RecipeStore::open(temp.path().join("recipes.xlsx")).unwrap();

        store.append(&record("a1", "Soup", "Title: Soup\nSteps: boil")).unwrap();
        store.append(&record("b2", "Pie", "Title: Pie")).unwrap();

        let found = store.find_by_id("a1").unwrap().unwrap();
        assert_eq!(found.title, "Soup");
        assert_eq!(found.text, "Title: Soup\nSteps: boil");
        assert!(store.find_by_id("zz").unwrap().is_none());

        let all = store.list().unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
        assert_eq!(all[1].image_path, "storage/images/b2.jpg");
        assert_eq!(all[1].text_path, "storage/texts/b2.txt");
        assert!(all[0].timestamp.ends_with('Z'));
    }

    #[test]
    fn test_find_returns_first_matching_row() {
        let temp = TempDir::new().unwrap();
        let store = RecipeStore::open(temp.path().join("recipes.xlsx")).unwrap();

        store.append(&record("dup", "First", "one")).unwrap();
        store.append(&record("dup", "Second", "two")).unwrap();

        assert_eq!(store.find_by_id("dup").unwrap().unwrap().title, "First");
    }

    #[test]
    fn test_find_never_matches_header_row() {
        let temp = TempDir::new().unwrap();
        let store = RecipeStore::open(temp.path().join("recipes.xlsx")).unwrap();

        assert!(store.find_by_id("id").unwrap().is_none());
    }

    #[test]
    fn test_missing_workbook_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = RecipeStore::at(temp.path().join("absent.xlsx"));

        assert!(matches!(
            store.find_by_id("a1"),
            Err(RecipeError::MissingStore(_))
        ));
        assert!(matches!(
            store.append(&record("a1", "t", "x")),
            Err(RecipeError::MissingStore(_))
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(RecipeStore::open(temp.path().join("recipes.xlsx")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .append(&record(&format!("id{i}"), "t", "x"))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids: Vec<String> = store.list().unwrap().into_iter().map(|r| r.id).collect();
        ids.sort();
        let expected: Vec<String> = (0..8).map(|i| format!("id{i}")).collect();
        assert_eq!(ids, expected);
    }
}
