use crate::{AssemblyError, Result, SectionDescriptor};
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info};
use std::path::Path;

/// Marker that separates a section title from its image folder id.
pub const FOLDER_MARKER: &str = "功能代碼:";

/// Query condition used when column B is left blank.
pub const MISSING_QUERY_TEXT: &str = "（未提供）";

pub trait Parser {
    /// Parse a configuration sheet into section descriptors, in row order.
    fn parse<P: AsRef<Path>>(&self, path: P) -> Result<Vec<SectionDescriptor>>;
}

/// Columns A and B of one data row, as raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRow {
    /// 1-based spreadsheet row number.
    pub row: usize,
    pub title: Option<String>,
    pub query: Option<String>,
}

/// Reads the first worksheet of an `.xlsx` workbook with calamine.
pub struct XlsxConfigParser {
    chapter_number: String,
}

impl XlsxConfigParser {
    pub fn new(chapter_number: impl Into<String>) -> Self {
        Self { chapter_number: chapter_number.into() }
    }

    /// Read columns A–B of every row below the header.
    pub fn read_rows<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ConfigRow>> {
        let path = path.as_ref();
        let spreadsheet_err = |message: String| AssemblyError::Spreadsheet {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_err(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| spreadsheet_err("workbook has no worksheets".to_string()))?
            .map_err(|e| spreadsheet_err(e.to_string()))?;

        // calamine ranges start at the first used cell, so address cells absolutely.
        let Some((last_row, _)) = range.end() else {
            return Ok(Vec::new());
        };

        let rows = (1..=last_row)
            .map(|row| ConfigRow {
                row: row as usize + 1,
                title: range.get_value((row, 0)).and_then(cell_text),
                query: range.get_value((row, 1)).and_then(cell_text),
            })
            .collect();
        Ok(rows)
    }
}

impl Parser for XlsxConfigParser {
    fn parse<P: AsRef<Path>>(&self, path: P) -> Result<Vec<SectionDescriptor>> {
        let rows = self.read_rows(path.as_ref())?;
        let sections = parse_rows(rows, &self.chapter_number);
        info!(
            "Parsed {} section(s) from {}",
            sections.len(),
            path.as_ref().display()
        );
        Ok(sections)
    }
}

/// Cell text, with blank, `FALSE` and zero cells read as empty.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Bool(false) | Data::Int(0) => None,
        Data::Float(f) if *f == 0.0 => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Turn raw rows into descriptors. Rows with a blank title are skipped and
/// do not consume a sequence index.
pub fn parse_rows<I>(rows: I, chapter_number: &str) -> Vec<SectionDescriptor>
where
    I: IntoIterator<Item = ConfigRow>,
{
    let mut sections = Vec::new();

    for row in rows {
        let raw_title = match row.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => {
                debug!("Skipping row {}: empty title", row.row);
                continue;
            }
        };

        let (title, folder_id) = split_title(raw_title);
        let query_condition = match row.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => q.to_string(),
            _ => MISSING_QUERY_TEXT.to_string(),
        };

        let sequence_index = sections.len() + 1;
        sections.push(SectionDescriptor {
            sequence_index,
            base_label: format!("{}.{}", chapter_number, sequence_index),
            folder_id,
            title,
            query_condition,
            source_row: row.row,
        });
    }

    sections
}

/// Split a title cell at the first folder marker into `(title, folder_id)`.
pub fn split_title(cell: &str) -> (String, String) {
    match cell.split_once(FOLDER_MARKER) {
        Some((before, after)) => {
            let before = before.trim();
            let before = before.strip_suffix(',').unwrap_or(before);
            let before = before.strip_suffix('，').unwrap_or(before);
            (before.trim().to_string(), after.trim().to_string())
        }
        None => (cell.trim().to_string(), String::new()),
    }
}
