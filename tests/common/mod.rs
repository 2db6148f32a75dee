#![allow(dead_code)]

use docx_rs::{Docx, Paragraph, Run, Style, StyleType};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::fs::{self, File};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::FileOptions;

pub const COVER_TEXT: &str = "操作手冊封面";

/// A one-paragraph template document.
pub fn write_template(path: &Path) {
    let file = File::create(path).unwrap();
    Docx::new()
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text(COVER_TEXT)))
        .build()
        .pack(file)
        .unwrap();
}

/// Like [`write_template`], with a `heading N` paragraph style under each given id.
pub fn write_template_with_headings(path: &Path, styles: &[(&str, u8)]) {
    let docx = styles.iter().fold(Docx::new(), |docx, (id, level)| {
        docx.add_style(Style::new(*id, StyleType::Paragraph).name(format!("heading {}", level)))
    });
    docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(COVER_TEXT)))
        .build()
        .pack(File::create(path).unwrap())
        .unwrap();
}

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

fn read_part(archive: &mut zip::ZipArchive<File>, name: &str) -> String {
    let mut xml = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut xml).unwrap();
    xml
}

/// Every paragraph of a saved document that carries a `w:pStyle`, as
/// `(text, style id, style name)`. The name is `None` when `styles.xml`
/// does not define the id.
pub fn styled_paragraphs(path: &Path) -> Vec<(String, String, Option<String>)> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let styles_xml = read_part(&mut archive, "word/styles.xml");
    let document_xml = read_part(&mut archive, "word/document.xml");

    let styles = roxmltree::Document::parse(&styles_xml).unwrap();
    let names: HashMap<&str, &str> = styles
        .descendants()
        .filter(|n| n.has_tag_name((W_NS, "style")))
        .filter_map(|style| {
            let id = style.attribute((W_NS, "styleId"))?;
            let name = style
                .children()
                .find(|c| c.has_tag_name((W_NS, "name")))?
                .attribute((W_NS, "val"))?;
            Some((id, name))
        })
        .collect();

    let document = roxmltree::Document::parse(&document_xml).unwrap();
    document
        .descendants()
        .filter(|n| n.has_tag_name((W_NS, "p")))
        .filter_map(|p| {
            let id = p
                .descendants()
                .find(|n| n.has_tag_name((W_NS, "pStyle")))?
                .attribute((W_NS, "val"))?;
            let text: String = p
                .descendants()
                .filter(|n| n.has_tag_name((W_NS, "t")))
                .filter_map(|t| t.text())
                .collect();
            Some((text, id.to_string(), names.get(id).map(|n| n.to_string())))
        })
        .collect()
}

/// Header row plus the given (column A, column B) rows; `None` leaves the cell blank.
pub fn write_sheet(path: &Path, rows: &[(Option<&str>, Option<&str>)]) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 0, "功能名稱").unwrap();
    worksheet.write_string(0, 1, "查詢條件").unwrap();
    for (i, (title, query)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        if let Some(title) = title {
            worksheet.write_string(row, 0, *title).unwrap();
        }
        if let Some(query) = query {
            worksheet.write_string(row, 1, *query).unwrap();
        }
    }
    workbook.save(path).unwrap();
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// `count` screenshots named `01.png`, `02.png`, ... in `dir`.
pub fn write_images(dir: &Path, count: usize) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        fs::write(dir.join(format!("{:02}.png", i + 1)), png_bytes(40, 30)).unwrap();
    }
}

/// Zip of `count` screenshots per folder, all under `prefix` (e.g. `"shots/"` or `""`).
pub fn write_images_zip(path: &Path, prefix: &str, folders: &[(&str, usize)]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let png = png_bytes(40, 30);
    for (folder, count) in folders {
        for i in 0..*count {
            zip.start_file(format!("{}{}/{:02}.png", prefix, folder, i + 1), FileOptions::default())
                .unwrap();
            zip.write_all(&png).unwrap();
        }
    }
    zip.finish().unwrap();
}
