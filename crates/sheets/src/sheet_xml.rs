//! Streaming access to SpreadsheetML worksheet parts.
//!
//! Worksheets are never deserialised into a full model. Reading walks the event stream and
//! collects cell values; writing copies the event stream through unchanged and only splices in
//! the cells being set. Anything this module does not understand (styles, merged ranges,
//! drawings, extension lists) therefore survives a round trip byte-for-byte.

use crate::{CellRef, SheetError, SheetResult};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, VecDeque};

/// One worksheet row as read from `sheetData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based row number.
    pub index: u32,
    /// Cell values by position; `values[0]` is column `A`. Gaps are empty strings.
    pub values: Vec<String>,
}

impl SheetRow {
    /// Value of a 1-based column, or `""` when the cell is absent.
    pub fn value(&self, column: u32) -> &str {
        column
            .checked_sub(1)
            .and_then(|i| self.values.get(i as usize))
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug)]
struct OpenCell {
    column: u32,
    kind: Option<String>,
    raw: String,
}

fn attr(e: &BytesStart<'_>, name: &str) -> SheetResult<Option<String>> {
    match e.try_get_attribute(name)? {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn row_index(e: &BytesStart<'_>, fallback: u32) -> SheetResult<u32> {
    Ok(attr(e, "r")?
        .and_then(|r| r.trim().parse::<u32>().ok())
        .unwrap_or(fallback))
}

fn cell_column(e: &BytesStart<'_>, fallback: u32) -> SheetResult<u32> {
    Ok(attr(e, "r")?
        .and_then(|r| r.parse::<CellRef>().ok())
        .map(|c| c.column())
        .unwrap_or(fallback))
}

/// Parses `xl/sharedStrings.xml` into its string table.
///
/// Rich-text runs inside one `<si>` are concatenated; phonetic hints are skipped.
pub(crate) fn read_shared_strings(xml: &str) -> SheetResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

/// Reads every row of a worksheet, resolving shared and inline strings.
pub(crate) fn read_rows(xml: &str, shared: &[String]) -> SheetResult<Vec<SheetRow>> {
    let mut reader = Reader::from_str(xml);
    let mut rows: Vec<SheetRow> = Vec::new();
    let mut row: Option<(u32, Vec<(u32, String)>)> = None;
    let mut cell: Option<OpenCell> = None;
    let mut next_row = 1u32;
    let mut next_col = 1u32;
    let mut in_value = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    let index = row_index(&e, next_row)?;
                    next_row = index.saturating_add(1);
                    next_col = 1;
                    row = Some((index, Vec::new()));
                }
                b"c" => {
                    let column = cell_column(&e, next_col)?;
                    cell = Some(OpenCell {
                        column,
                        kind: attr(&e, "t")?,
                        raw: String::new(),
                    });
                }
                b"v" | b"t" if cell.is_some() => in_value = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    let index = row_index(&e, next_row)?;
                    next_row = index.saturating_add(1);
                    rows.push(SheetRow {
                        index,
                        values: Vec::new(),
                    });
                }
                b"c" => {
                    let column = cell_column(&e, next_col)?;
                    next_col = column.saturating_add(1);
                    if let Some((_, cells)) = row.as_mut() {
                        cells.push((column, String::new()));
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_value => {
                if let Some(c) = cell.as_mut() {
                    c.raw.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) if in_value => {
                if let Some(c) = cell.as_mut() {
                    c.raw.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(c) = cell.take() {
                        next_col = c.column.saturating_add(1);
                        let value = match c.kind.as_deref() {
                            Some("s") => c
                                .raw
                                .trim()
                                .parse::<usize>()
                                .ok()
                                .and_then(|i| shared.get(i).cloned())
                                .unwrap_or_default(),
                            _ => c.raw,
                        };
                        if let Some((_, cells)) = row.as_mut() {
                            cells.push((c.column, value));
                        }
                    }
                }
                b"row" => {
                    if let Some((index, cells)) = row.take() {
                        rows.push(SheetRow {
                            index,
                            values: dense(cells),
                        });
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rows)
}

fn dense(cells: Vec<(u32, String)>) -> Vec<String> {
    let width = cells.iter().map(|(c, _)| *c).max().unwrap_or(0) as usize;
    let mut values = vec![String::new(); width];
    for (column, value) in cells {
        if let Some(slot) = column.checked_sub(1).and_then(|i| values.get_mut(i as usize)) {
            *slot = value;
        }
    }
    values
}

/// Drops characters that XML 1.0 cannot carry.
fn xml_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c: &char| {
            matches!(*c, '\t' | '\n' | '\r') || (*c >= ' ' && !matches!(*c, '\u{FFFE}' | '\u{FFFF}'))
        })
        .collect()
}

struct CellWriter {
    writer: Writer<Vec<u8>>,
    prefix: String,
}

impl CellWriter {
    fn tag(&self, local: &str) -> String {
        format!("{}{}", self.prefix, local)
    }

    fn event(&mut self, event: Event<'_>) -> SheetResult<()> {
        self.writer.write_event(event)?;
        Ok(())
    }

    fn cell(&mut self, cell: CellRef, value: &str, style: Option<&str>) -> SheetResult<()> {
        let reference = cell.to_string();
        let mut start = BytesStart::new(self.tag("c"));
        start.push_attribute(("r", reference.as_str()));
        if let Some(s) = style {
            start.push_attribute(("s", s));
        }
        start.push_attribute(("t", "inlineStr"));
        self.event(Event::Start(start))?;
        self.event(Event::Start(BytesStart::new(self.tag("is"))))?;
        let mut text = BytesStart::new(self.tag("t"));
        text.push_attribute(("xml:space", "preserve"));
        self.event(Event::Start(text))?;
        let safe = xml_safe(value);
        self.event(Event::Text(BytesText::new(&safe)))?;
        self.event(Event::End(BytesEnd::new(self.tag("t"))))?;
        self.event(Event::End(BytesEnd::new(self.tag("is"))))?;
        self.event(Event::End(BytesEnd::new(self.tag("c"))))
    }

    fn cells_before(
        &mut self,
        row_cells: &mut VecDeque<(CellRef, String)>,
        column: Option<u32>,
    ) -> SheetResult<()> {
        while let Some((cell, _)) = row_cells.front() {
            if column.is_some_and(|limit| cell.column() >= limit) {
                break;
            }
            if let Some((cell, value)) = row_cells.pop_front() {
                self.cell(cell, &value, None)?;
            }
        }
        Ok(())
    }

    fn rows_before(
        &mut self,
        pending: &mut BTreeMap<u32, VecDeque<(CellRef, String)>>,
        row: Option<u32>,
    ) -> SheetResult<()> {
        while let Some(entry) = pending.first_entry() {
            if row.is_some_and(|limit| *entry.key() >= limit) {
                break;
            }
            let (index, mut cells) = entry.remove_entry();
            let index = index.to_string();
            let mut start = BytesStart::new(self.tag("row"));
            start.push_attribute(("r", index.as_str()));
            self.event(Event::Start(start))?;
            self.cells_before(&mut cells, None)?;
            self.event(Event::End(BytesEnd::new(self.tag("row"))))?;
        }
        Ok(())
    }
}

/// Copies a row start tag without its `spans` hint, which goes stale once cells are added.
fn row_start_without_spans(e: &BytesStart<'_>) -> SheetResult<BytesStart<'static>> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for a in e.attributes() {
        let a = a?;
        if a.key.as_ref() != b"spans" {
            out.push_attribute(a);
        }
    }
    Ok(out)
}

/// Rewrites a worksheet so that each cell in `cells` holds the given string.
///
/// Existing cells at those positions are replaced (keeping their style index); missing rows
/// and cells are inserted in document order. All other XML is passed through unchanged.
pub(crate) fn write_cells(xml: &str, cells: &BTreeMap<CellRef, String>) -> SheetResult<String> {
    let mut pending: BTreeMap<u32, VecDeque<(CellRef, String)>> = BTreeMap::new();
    for (cell, value) in cells {
        pending
            .entry(cell.row())
            .or_default()
            .push_back((*cell, value.clone()));
    }

    let mut reader = Reader::from_str(xml);
    let mut out = CellWriter {
        writer: Writer::new(Vec::with_capacity(xml.len() + 256)),
        prefix: String::new(),
    };
    let mut row_cells: VecDeque<(CellRef, String)> = VecDeque::new();
    let mut in_sheet_data = false;
    let mut saw_sheet_data = false;
    let mut skip_depth = 0usize;
    let mut next_row = 1u32;
    let mut next_col = 1u32;

    loop {
        let event = reader.read_event()?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                out.prefix = name
                    .split_once(':')
                    .map(|(p, _)| format!("{}:", p))
                    .unwrap_or_default();
                in_sheet_data = true;
                saw_sheet_data = true;
                out.event(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                out.prefix = name
                    .split_once(':')
                    .map(|(p, _)| format!("{}:", p))
                    .unwrap_or_default();
                saw_sheet_data = true;
                out.event(Event::Start(e))?;
                out.rows_before(&mut pending, None)?;
                out.event(Event::End(BytesEnd::new(name)))?;
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"sheetData" => {
                out.rows_before(&mut pending, None)?;
                in_sheet_data = false;
                out.event(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let index = row_index(&e, next_row)?;
                next_row = index.saturating_add(1);
                next_col = 1;
                out.rows_before(&mut pending, Some(index))?;
                row_cells = pending.remove(&index).unwrap_or_default();
                if row_cells.is_empty() {
                    out.event(Event::Start(e))?;
                } else {
                    out.event(Event::Start(row_start_without_spans(&e)?))?;
                }
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let index = row_index(&e, next_row)?;
                next_row = index.saturating_add(1);
                out.rows_before(&mut pending, Some(index))?;
                match pending.remove(&index) {
                    Some(mut cells) => {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        out.event(Event::Start(row_start_without_spans(&e)?))?;
                        out.cells_before(&mut cells, None)?;
                        out.event(Event::End(BytesEnd::new(name)))?;
                    }
                    None => out.event(Event::Empty(e))?,
                }
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                out.cells_before(&mut row_cells, None)?;
                out.event(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                let column = cell_column(&e, next_col)?;
                next_col = column.saturating_add(1);
                out.cells_before(&mut row_cells, Some(column))?;
                if row_cells.front().is_some_and(|(c, _)| c.column() == column) {
                    if let Some((cell, value)) = row_cells.pop_front() {
                        let style = attr(&e, "s")?;
                        out.cell(cell, &value, style.as_deref())?;
                        skip_depth = 1;
                    }
                } else {
                    out.event(Event::Start(e))?;
                }
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                let column = cell_column(&e, next_col)?;
                next_col = column.saturating_add(1);
                out.cells_before(&mut row_cells, Some(column))?;
                if row_cells.front().is_some_and(|(c, _)| c.column() == column) {
                    if let Some((cell, value)) = row_cells.pop_front() {
                        let style = attr(&e, "s")?;
                        out.cell(cell, &value, style.as_deref())?;
                    }
                } else {
                    out.event(Event::Empty(e))?;
                }
            }
            Event::Eof => break,
            other => out.event(other)?,
        }
    }

    if !saw_sheet_data && !cells.is_empty() {
        return Err(SheetError::MissingPart("worksheet sheetData".into()));
    }

    Ok(String::from_utf8_lossy(&out.writer.into_inner()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main""#;

    fn cells(pairs: &[(&str, &str)]) -> BTreeMap<CellRef, String> {
        pairs
            .iter()
            .map(|(r, v)| (r.parse().unwrap(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_read_rows_resolves_shared_and_inline_strings() {
        let xml = format!(
            r#"<worksheet {NS}><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="inlineStr"><is><t>inline</t></is></c></row>
<row r="3"><c r="B3"><v>42</v></c><c r="C3" t="s"><v>1</v></c></row>
</sheetData></worksheet>"#
        );
        let shared = vec!["first".to_string(), "second".to_string()];

        let rows = read_rows(&xml, &shared).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].values, vec!["first", "", "inline"]);
        assert_eq!(rows[1].index, 3);
        assert_eq!(rows[1].value(2), "42");
        assert_eq!(rows[1].value(3), "second");
        assert_eq!(rows[1].value(9), "");
    }

    #[test]
    fn test_read_rows_unescapes_and_keeps_newlines() {
        let xml = format!(
            r#"<worksheet {NS}><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t xml:space="preserve">Salt &amp; pepper
Oil</t></is></c></row></sheetData></worksheet>"#
        );

        let rows = read_rows(&xml, &[]).unwrap();

        assert_eq!(rows[0].value(1), "Salt & pepper\nOil");
    }

    #[test]
    fn test_read_shared_strings_concatenates_runs() {
        let xml = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<si><t>plain</t></si>
<si><r><t>rich </t></r><r><t>text</t></r><rPh><t>ignored</t></rPh></si>
<si/>
</sst>"#;

        let strings = read_shared_strings(xml).unwrap();

        assert_eq!(strings, vec!["plain", "rich text", ""]);
    }

    #[test]
    fn test_write_cells_into_empty_sheet_data() {
        let xml = format!(r#"<worksheet {NS}><sheetData/></worksheet>"#);

        let out = write_cells(&xml, &cells(&[("B5", "Flour"), ("B2", "Soup")])).unwrap();
        let rows = read_rows(&out, &[]).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 2);
        assert_eq!(rows[0].value(2), "Soup");
        assert_eq!(rows[1].index, 5);
        assert_eq!(rows[1].value(2), "Flour");
        assert!(out.find("r=\"2\"").unwrap() < out.find("r=\"5\"").unwrap());
    }

    #[test]
    fn test_write_cells_replaces_and_keeps_style() {
        let xml = format!(
            r#"<worksheet {NS}><sheetData><row r="2" spans="1:2"><c r="A2" t="s"><v>0</v></c><c r="B2" s="7" t="s"><v>1</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="B5:D11"/></mergeCells></worksheet>"#
        );

        let out = write_cells(&xml, &cells(&[("B2", "Pancakes")])).unwrap();

        assert!(out.contains(r#"<c r="B2" s="7" t="inlineStr">"#));
        assert!(out.contains("Pancakes"));
        assert!(!out.contains("spans="));
        assert!(out.contains(r#"<c r="A2" t="s"><v>0</v></c>"#));
        assert!(out.contains(r#"<mergeCell ref="B5:D11"/>"#));
        let rows = read_rows(&out, &["Nimi".to_string()]).unwrap();
        assert_eq!(rows[0].values, vec!["Nimi", "Pancakes"]);
    }

    #[test]
    fn test_write_cells_inserts_between_existing_rows_and_cells() {
        let xml = format!(
            r#"<worksheet {NS}><sheetData><row r="1"><c r="A1"><v>1</v></c><c r="C1"><v>3</v></c></row><row r="4"><c r="A4"><v>4</v></c></row></sheetData></worksheet>"#
        );

        let out = write_cells(&xml, &cells(&[("B1", "mid"), ("A3", "new row"), ("D9", "tail")]))
            .unwrap();
        let rows = read_rows(&out, &[]).unwrap();

        let indices: Vec<u32> = rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 3, 4, 9]);
        assert_eq!(rows[0].values, vec!["1", "mid", "3"]);
        assert_eq!(rows[1].value(1), "new row");
        assert_eq!(rows[3].value(4), "tail");
    }

    #[test]
    fn test_write_cells_escapes_and_drops_control_characters() {
        let xml = format!(r#"<worksheet {NS}><sheetData/></worksheet>"#);

        let out = write_cells(&xml, &cells(&[("A1", "<b>&\u{0007}\nok")])).unwrap();

        assert!(out.contains("&lt;b&gt;&amp;"));
        assert!(!out.contains('\u{0007}'));
        let rows = read_rows(&out, &[]).unwrap();
        assert_eq!(rows[0].value(1), "<b>&\nok");
    }

    #[test]
    fn test_write_cells_honours_namespace_prefix() {
        let xml = r#"<x:worksheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheetData></x:sheetData></x:worksheet>"#;

        let out = write_cells(xml, &cells(&[("A1", "v")])).unwrap();

        assert!(out.contains(r#"<x:row r="1"><x:c r="A1" t="inlineStr"><x:is>"#));
    }

    #[test]
    fn test_write_cells_requires_sheet_data() {
        let xml = format!(r#"<worksheet {NS}></worksheet>"#);

        let result = write_cells(&xml, &cells(&[("A1", "v")]));

        assert!(matches!(result, Err(SheetError::MissingPart(_))));
    }
}
