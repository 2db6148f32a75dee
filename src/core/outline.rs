use crate::{AssemblyError, Result};
use roxmltree::{Document, Node};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// One top-level block of a saved document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutlineEntry {
    Heading { level: u8, text: String },
    Paragraph { text: String, centered: bool },
    Image { width_emu: u64, centered: bool },
    PageBreak,
    Table,
}

/// Block counts over an outline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutlineSummary {
    pub headings: usize,
    pub paragraphs: usize,
    pub images: usize,
    pub page_breaks: usize,
    /// Paragraphs whose text contains `警告`.
    pub warnings: usize,
}

impl OutlineSummary {
    pub fn of(entries: &[OutlineEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry {
                OutlineEntry::Heading { .. } => summary.headings += 1,
                OutlineEntry::Paragraph { text, .. } => {
                    summary.paragraphs += 1;
                    if text.contains("警告") {
                        summary.warnings += 1;
                    }
                }
                OutlineEntry::Image { .. } => summary.images += 1,
                OutlineEntry::PageBreak => summary.page_breaks += 1,
                OutlineEntry::Table => {}
            }
        }
        summary
    }
}

/// Read `word/document.xml` from a `.docx` and flatten its body.
///
/// A paragraph is a heading when its style is named `heading N` in
/// `word/styles.xml`, or when the style id is `{heading_style_prefix}{level}`.
pub fn read_outline<P: AsRef<Path>>(path: P, heading_style_prefix: &str) -> Result<Vec<OutlineEntry>> {
    let path = path.as_ref();
    let inspect_err = |message: String| AssemblyError::Inspect {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| inspect_err(e.to_string()))?;

    let mut doc_xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| inspect_err(e.to_string()))?
        .read_to_string(&mut doc_xml)?;
    let doc = Document::parse(&doc_xml).map_err(|e| inspect_err(e.to_string()))?;

    let heading_styles = match archive.by_name("word/styles.xml") {
        Ok(mut entry) => {
            let mut styles_xml = String::new();
            entry.read_to_string(&mut styles_xml)?;
            heading_style_levels(&styles_xml).map_err(|e| inspect_err(e.to_string()))?
        }
        Err(_) => HashMap::new(),
    };
    let headings = HeadingStyles {
        by_id: &heading_styles,
        prefix: heading_style_prefix,
    };

    let Some(body) = doc.descendants().find(|n| is_w(n, "body")) else {
        return Ok(Vec::new());
    };

    let entries = body
        .children()
        .filter(|n| n.is_element())
        .filter_map(|n| match n.tag_name().name() {
            "p" => Some(classify_paragraph(n, &headings)),
            "tbl" => Some(OutlineEntry::Table),
            _ => None,
        })
        .collect();
    Ok(entries)
}

struct HeadingStyles<'a> {
    by_id: &'a HashMap<String, u8>,
    prefix: &'a str,
}

impl HeadingStyles<'_> {
    fn level(&self, style_id: &str) -> Option<u8> {
        self.by_id.get(style_id).copied().or_else(|| {
            style_id
                .strip_prefix(self.prefix)
                .and_then(|lvl| lvl.trim().parse::<u8>().ok())
        })
    }
}

/// Paragraph style ids in a `styles.xml` whose name is `heading N`.
pub fn heading_style_levels(styles_xml: &str) -> std::result::Result<HashMap<String, u8>, roxmltree::Error> {
    let doc = Document::parse(styles_xml)?;
    let levels = doc
        .descendants()
        .filter(|n| is_w(n, "style") && n.attribute((W_NS, "type")) == Some("paragraph"))
        .filter_map(|style| {
            let id = style.attribute((W_NS, "styleId"))?;
            let name = style
                .children()
                .find(|c| is_w(c, "name"))?
                .attribute((W_NS, "val"))?;
            Some((id.to_string(), heading_level_of_name(name)?))
        })
        .collect();
    Ok(levels)
}

/// `heading 2` (any case) -> 2.
pub fn heading_level_of_name(name: &str) -> Option<u8> {
    let lower = name.trim().to_lowercase();
    lower.strip_prefix("heading ")?.trim().parse().ok()
}

fn is_w(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == Some(W_NS)
}

fn classify_paragraph(p: Node, headings: &HeadingStyles) -> OutlineEntry {
    let p_pr = p.children().find(|c| is_w(c, "pPr"));
    let centered = p_pr
        .and_then(|ppr| ppr.children().find(|c| is_w(c, "jc")))
        .and_then(|jc| jc.attribute((W_NS, "val")))
        .map(|v| v == "center")
        .unwrap_or(false);

    if let Some(extent) = p
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "extent")
    {
        let width_emu = extent.attribute("cx").and_then(|v| v.parse().ok()).unwrap_or(0);
        return OutlineEntry::Image { width_emu, centered };
    }

    let text = paragraph_text(p);
    let page_break = p
        .descendants()
        .any(|n| is_w(&n, "br") && n.attribute((W_NS, "type")) == Some("page"));
    if page_break && text.trim().is_empty() {
        return OutlineEntry::PageBreak;
    }

    let level = p_pr
        .and_then(|ppr| ppr.children().find(|c| is_w(c, "pStyle")))
        .and_then(|style| style.attribute((W_NS, "val")))
        .and_then(|val| headings.level(val));

    match level {
        Some(level) => OutlineEntry::Heading { level, text },
        None => OutlineEntry::Paragraph { text, centered },
    }
}

fn paragraph_text(p: Node) -> String {
    p.descendants()
        .filter(|n| is_w(n, "t"))
        .filter_map(|t| t.text())
        .collect()
}
