//! In-memory xlsx package.
//!
//! An xlsx file is a zip archive of XML parts. [`Workbook`] keeps every part as raw bytes,
//! resolves which part backs which sheet, and rewrites only the worksheet parts that are
//! edited. Saving writes the parts back in their original order, so anything the template
//! author put in the file (styles, column widths, printing setup, images) is preserved.

use crate::sheet_xml::{read_rows, read_shared_strings, write_cells, SheetRow};
use crate::{CellRef, SheetError, SheetResult};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const ROOT_RELS: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";
const SHARED_STRINGS_REL: &str = "/sharedStrings";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
}

/// A sheet as listed in `xl/workbook.xml`, with its worksheet part resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SheetInfo {
    name: String,
    part: String,
}

/// An xlsx workbook held in memory.
#[derive(Debug, Clone)]
pub struct Workbook {
    parts: Vec<Part>,
    sheets: Vec<SheetInfo>,
    active: usize,
    shared_strings_part: Option<String>,
}

impl Workbook {
    /// Reads a workbook from disk.
    ///
    /// # Errors
    ///
    /// Returns `SheetError` if the file cannot be read, is not a zip archive, or lacks the
    /// workbook part.
    pub fn open(path: &Path) -> SheetResult<Self> {
        let bytes = fs::read(path).map_err(|e| {
            SheetError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read workbook {}: {}", path.display(), e),
            ))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parses a workbook from the bytes of an xlsx file.
    pub fn from_bytes(bytes: &[u8]) -> SheetResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut data)?;
            parts.push(Part { name, data });
        }

        let mut workbook = Self {
            parts,
            sheets: Vec::new(),
            active: 0,
            shared_strings_part: None,
        };
        workbook.index_sheets()?;
        Ok(workbook)
    }

    /// Creates a workbook with a single empty sheet.
    pub fn blank(sheet_name: &str) -> Self {
        let escaped_name = escape(sheet_name);
        let parts = vec![
            Part {
                name: "[Content_Types].xml".into(),
                data: concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
                    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                    r#"</Types>"#
                )
                .into(),
            },
            Part {
                name: ROOT_RELS.into(),
                data: concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
                    r#"</Relationships>"#
                )
                .into(),
            },
            Part {
                name: DEFAULT_WORKBOOK_PART.into(),
                data: format!(
                    concat!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
                        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
                        r#"<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets>"#,
                        r#"</workbook>"#
                    ),
                    escaped_name
                )
                .into_bytes(),
            },
            Part {
                name: "xl/_rels/workbook.xml.rels".into(),
                data: concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
                    r#"</Relationships>"#
                )
                .into(),
            },
            Part {
                name: "xl/worksheets/sheet1.xml".into(),
                data: concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
                    r#"<sheetData/>"#,
                    r#"</worksheet>"#
                )
                .into(),
            },
        ];

        Self {
            parts,
            sheets: vec![SheetInfo {
                name: sheet_name.to_string(),
                part: "xl/worksheets/sheet1.xml".into(),
            }],
            active: 0,
            shared_strings_part: None,
        }
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Name of the sheet that opens first in a spreadsheet application.
    pub fn active_sheet(&self) -> &str {
        self.sheets
            .get(self.active)
            .or_else(|| self.sheets.first())
            .map(|s| s.name.as_str())
            .unwrap_or("")
    }

    /// Reads all rows of a sheet.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::SheetNotFound`] for an unknown sheet name, or an XML error if the
    /// worksheet part is malformed.
    pub fn rows(&self, sheet: &str) -> SheetResult<Vec<SheetRow>> {
        let xml = self.part_str(&self.sheet_part(sheet)?.to_string())?;
        let shared = match &self.shared_strings_part {
            Some(part) => read_shared_strings(self.part_str(part)?)?,
            None => Vec::new(),
        };
        read_rows(xml, &shared)
    }

    /// Sets string values on a sheet, replacing whatever the cells held before.
    pub fn set_cells(&mut self, sheet: &str, cells: &BTreeMap<CellRef, String>) -> SheetResult<()> {
        if cells.is_empty() {
            return Ok(());
        }
        let part = self.sheet_part(sheet)?.to_string();
        let rewritten = write_cells(self.part_str(&part)?, cells)?;
        self.set_part(&part, rewritten.into_bytes());
        Ok(())
    }

    /// Appends `values` (starting at column `A`) below the last row that holds any cell.
    ///
    /// # Returns
    ///
    /// The 1-based row number that was written.
    pub fn append_row<S: AsRef<str>>(&mut self, sheet: &str, values: &[S]) -> SheetResult<u32> {
        let last = self
            .rows(sheet)?
            .iter()
            .filter(|r| !r.values.is_empty())
            .map(|r| r.index)
            .max()
            .unwrap_or(0);
        let row = last + 1;

        let mut cells = BTreeMap::new();
        for (i, value) in values.iter().enumerate() {
            let column = u32::try_from(i + 1)
                .map_err(|_| SheetError::InvalidCellRef(format!("column {}", i + 1)))?;
            cells.insert(CellRef::new(row, column)?, value.as_ref().to_string());
        }
        self.set_cells(sheet, &cells)?;
        Ok(row)
    }

    /// Serialises the workbook back into xlsx bytes.
    pub fn to_bytes(&self) -> SheetResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for part in &self.parts {
            zip.start_file(part.name.as_str(), options)?;
            zip.write_all(&part.data)?;
        }
        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Writes the workbook to `path`.
    ///
    /// The bytes go to a sibling temporary file first and are renamed into place, so readers
    /// never observe a half-written workbook.
    pub fn save(&self, path: &Path) -> SheetResult<()> {
        let bytes = self.to_bytes()?;
        let tmp = temp_sibling(path);
        fs::write(&tmp, &bytes).map_err(|e| {
            SheetError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write workbook {}: {}", tmp.display(), e),
            ))
        })?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(SheetError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to move workbook into {}: {}", path.display(), e),
            )));
        }
        Ok(())
    }

    fn sheet_part(&self, sheet: &str) -> SheetResult<&str> {
        self.sheets
            .iter()
            .find(|s| s.name == sheet)
            .map(|s| s.part.as_str())
            .ok_or_else(|| SheetError::SheetNotFound(sheet.to_string()))
    }

    fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    fn part_str(&self, name: &str) -> SheetResult<&str> {
        let bytes = self
            .part(name)
            .ok_or_else(|| SheetError::MissingPart(name.to_string()))?;
        Ok(std::str::from_utf8(bytes)?)
    }

    fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
            }),
        }
    }

    fn index_sheets(&mut self) -> SheetResult<()> {
        let workbook_part = match self.part(ROOT_RELS) {
            Some(_) => relationships(self.part_str(ROOT_RELS)?)?
                .into_iter()
                .find(|r| r.kind.ends_with(OFFICE_DOCUMENT_REL))
                .map(|r| resolve_target("", &r.target))
                .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string()),
            None => DEFAULT_WORKBOOK_PART.to_string(),
        };
        let base_dir = workbook_part
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();
        let rels_part = match workbook_part.rsplit_once('/') {
            Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
            None => format!("_rels/{}.rels", workbook_part),
        };

        let rels = match self.part(&rels_part) {
            Some(_) => relationships(self.part_str(&rels_part)?)?,
            None => Vec::new(),
        };
        let (listed, active) = sheet_listing(self.part_str(&workbook_part)?)?;

        let mut sheets = Vec::with_capacity(listed.len());
        for (index, (name, rel_id)) in listed.into_iter().enumerate() {
            let part = rels
                .iter()
                .find(|r| Some(&r.id) == rel_id.as_ref())
                .map(|r| resolve_target(&base_dir, &r.target))
                .unwrap_or_else(|| format!("{}/worksheets/sheet{}.xml", base_dir, index + 1));
            sheets.push(SheetInfo { name, part });
        }

        self.shared_strings_part = rels
            .iter()
            .find(|r| r.kind.ends_with(SHARED_STRINGS_REL))
            .map(|r| resolve_target(&base_dir, &r.target))
            .filter(|p| self.part(p).is_some());
        self.active = if active < sheets.len() { active } else { 0 };
        self.sheets = sheets;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook.xlsx".into());
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}-{}.tmp", file_name, std::process::id(), n))
}

#[derive(Debug)]
struct Relationship {
    id: String,
    kind: String,
    target: String,
}

fn relationships(xml: &str) -> SheetResult<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = String::new();
                let mut kind = String::new();
                let mut target = String::new();
                for a in e.attributes() {
                    let a = a?;
                    let value = a.unescape_value()?.into_owned();
                    match a.key.local_name().as_ref() {
                        b"Id" => id = value,
                        b"Type" => kind = value,
                        b"Target" => target = value,
                        _ => {}
                    }
                }
                rels.push(Relationship { id, kind, target });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

/// Returns `(name, relationship id)` per sheet plus the active tab index.
fn sheet_listing(xml: &str) -> SheetResult<(Vec<(String, Option<String>)>, usize)> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    let mut active = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sheet" => {
                    let mut name = String::new();
                    let mut rel_id = None;
                    for a in e.attributes() {
                        let a = a?;
                        if a.key.as_ref() == b"name" {
                            name = a.unescape_value()?.into_owned();
                        } else if a.key.local_name().as_ref() == b"id" && a.key.prefix().is_some() {
                            rel_id = Some(a.unescape_value()?.into_owned());
                        }
                    }
                    sheets.push((name, rel_id));
                }
                b"workbookView" => {
                    if let Some(tab) = e.try_get_attribute("activeTab")? {
                        active = tab.unescape_value()?.trim().parse().unwrap_or(0);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok((sheets, active))
}

/// Resolves a relationship target against the directory of the part that declared it.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Fills a template workbook and saves the result as a new file.
///
/// `sheet` selects the sheet to fill; `None` means the active sheet. The template file itself
/// is never modified.
///
/// # Errors
///
/// Returns `SheetError` if the template cannot be read or parsed, the sheet does not exist, or
/// the output cannot be written.
pub fn render_template(
    template: &Path,
    sheet: Option<&str>,
    cells: &BTreeMap<CellRef, String>,
    output: &Path,
) -> SheetResult<()> {
    let mut workbook = Workbook::open(template)?;
    let sheet = match sheet {
        Some(name) => name.to_string(),
        None => workbook.active_sheet().to_string(),
    };
    workbook.set_cells(&sheet, cells)?;
    workbook.save(output)
}
