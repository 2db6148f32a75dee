use crate::config::AssemblyConfig;
use crate::core::document::{Alignment, Document, FontPair};
use crate::core::layout::{render_template, LayoutStep, SectionLayout};
use crate::{AssemblyError, Result, SectionDescriptor};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// File extensions (lower-case) picked up from an image folder.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// What one call to the assembler appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    pub images: usize,
    pub warnings: usize,
    pub folder_missing: bool,
}

/// Appends the section skeleton for one descriptor to a document.
pub struct SectionAssembler<'a> {
    layout: &'a SectionLayout,
    fonts: FontPair,
    image_width_emu: u32,
}

impl<'a> SectionAssembler<'a> {
    pub fn new(config: &AssemblyConfig, layout: &'a SectionLayout) -> Self {
        Self {
            layout,
            fonts: FontPair {
                latin: config.latin_font.clone(),
                east_asia: config.east_asia_font.clone(),
            },
            image_width_emu: config.image_width_emu(),
        }
    }

    /// Append one section, drawing screenshots from `image_folder`.
    ///
    /// Missing folders, missing slots and unusable images become warning
    /// paragraphs; only I/O failures while listing the folder are returned.
    pub fn assemble(
        &self,
        doc: &mut Document,
        section: &SectionDescriptor,
        image_folder: &Path,
    ) -> Result<SectionReport> {
        let images = list_images(image_folder)?;
        self.append_section(doc, section, images)
    }

    /// Like [`assemble`](Self::assemble), resolving the section's folder id
    /// under `image_root`. Ids that would leave the root count as missing.
    pub fn assemble_under(
        &self,
        doc: &mut Document,
        section: &SectionDescriptor,
        image_root: &Path,
    ) -> Result<SectionReport> {
        let images = match resolve_image_folder(image_root, &section.folder_id) {
            Some(folder) => list_images(&folder)?,
            None => {
                warn!("Folder id {:?} escapes the image root, ignoring it", section.folder_id);
                None
            }
        };
        self.append_section(doc, section, images)
    }

    fn append_section(
        &self,
        doc: &mut Document,
        section: &SectionDescriptor,
        images: Option<Vec<PathBuf>>,
    ) -> Result<SectionReport> {
        info!(
            "Assembling section {} ({}) from folder {:?}",
            section.base_label, section.title, section.folder_id
        );
        let mut report = SectionReport::default();

        let images = images.unwrap_or_else(|| {
            warn!("Image folder {:?} not found", section.folder_id);
            self.paragraph(doc, &format!("警告：找不到與 {} 對應的圖片資料夾。", section.folder_id));
            report.folder_missing = true;
            report.warnings += 1;
            Vec::new()
        });

        for step in &self.layout.steps {
            match step {
                LayoutStep::PageBreak => doc.append_page_break(),
                LayoutStep::Heading { level, text } => {
                    doc.append_heading(&render_template(text, section), *level)
                        .set_fonts(&self.fonts);
                }
                LayoutStep::Paragraph { text } => {
                    self.paragraph(doc, &render_template(text, section));
                }
                LayoutStep::Image { slot } => self.insert_slot(doc, &images, *slot, &mut report),
            }
        }

        if report.warnings > 0 {
            warn!(
                "Section {} finished with {} warning(s), {} image(s)",
                section.base_label, report.warnings, report.images
            );
        }
        Ok(report)
    }

    fn insert_slot(&self, doc: &mut Document, images: &[PathBuf], slot: usize, report: &mut SectionReport) {
        let number = slot + 1;
        let Some(path) = images.get(slot) else {
            debug!("Slot {} has no image", number);
            self.paragraph(doc, &format!("（警告：此處缺少第 {} 張圖片）", number))
                .align(Alignment::Center);
            report.warnings += 1;
            return;
        };

        match doc.append_image(path, self.image_width_emu) {
            Ok(block) => {
                block.align(Alignment::Center);
                debug!("Slot {} <- {}", number, path.display());
                report.images += 1;
            }
            Err(err) => {
                warn!("Slot {}: {}", number, err);
                self.paragraph(
                    doc,
                    &format!("（警告：處理第 {} 張圖片時發生錯誤: {}）", number, describe_image_error(&err)),
                )
                .align(Alignment::Center);
                report.warnings += 1;
            }
        }
    }

    fn paragraph<'d>(&self, doc: &'d mut Document, text: &str) -> &'d mut crate::core::document::TextBlock {
        doc.append_paragraph(text).set_fonts(&self.fonts)
    }
}

/// Images in `folder` sorted by file name, or `None` if the folder is absent.
pub fn list_images(folder: &Path) -> Result<Option<Vec<PathBuf>>> {
    if folder.is_file() {
        return Ok(None);
    }
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(Some(images))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Join `folder_id` onto `root` unless it contains absolute or `..` parts.
pub fn resolve_image_folder(root: &Path, folder_id: &str) -> Option<PathBuf> {
    let relative = Path::new(folder_id);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    contained.then(|| root.join(relative))
}

fn describe_image_error(err: &AssemblyError) -> String {
    let name = |path: &Path| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    match err {
        AssemblyError::ImageRead { path, source } => format!("{}: {}", name(path), source),
        AssemblyError::ImageDecode { path, source } => format!("{}: {}", name(path), source),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::Block;
    use tempfile::TempDir;

    fn descriptor(folder_id: &str) -> SectionDescriptor {
        SectionDescriptor {
            sequence_index: 1,
            base_label: "1.1".into(),
            folder_id: folder_id.into(),
            title: "Title".into(),
            query_condition: "ID > 5".into(),
            source_row: 2,
        }
    }

    fn folder_with_images(count: usize) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..count {
            image::RgbImage::new(4, 3)
                .save(dir.path().join(format!("{:02}.png", i + 1)))
                .unwrap();
        }
        dir
    }

    fn warnings(doc: &Document) -> Vec<String> {
        doc.blocks()
            .iter()
            .filter_map(Block::as_text)
            .map(|t| t.text())
            .filter(|t| t.contains("警告"))
            .collect()
    }

    fn image_count(doc: &Document) -> usize {
        doc.blocks().iter().filter(|b| matches!(b, Block::Image(_))).count()
    }

    #[test]
    fn full_folder_fills_every_slot() {
        let (config, layout) = (AssemblyConfig::default(), SectionLayout::builtin());
        let assembler = SectionAssembler::new(&config, &layout);
        let dir = folder_with_images(11);
        let mut doc = Document::blank();

        let report = assembler.assemble(&mut doc, &descriptor("001"), dir.path()).unwrap();

        assert_eq!(report, SectionReport { images: 11, warnings: 0, folder_missing: false });
        assert_eq!(image_count(&doc), 11);
        assert!(warnings(&doc).is_empty());
        let breaks = doc.blocks().iter().filter(|b| **b == Block::PageBreak).count();
        assert_eq!(breaks, 5);
        for block in doc.blocks() {
            if let Block::Image(img) = block {
                assert_eq!(img.extent_emu.0, config.image_width_emu());
                assert_eq!(img.alignment, Alignment::Center);
            }
        }
    }

    #[test]
    fn heading_and_query_text_are_interpolated() {
        let (config, layout) = (AssemblyConfig::default(), SectionLayout::builtin());
        let assembler = SectionAssembler::new(&config, &layout);
        let dir = folder_with_images(0);
        let mut doc = Document::blank();
        assembler.assemble(&mut doc, &descriptor("001"), dir.path()).unwrap();

        let texts: Vec<&crate::core::document::TextBlock> =
            doc.blocks().iter().filter_map(Block::as_text).collect();
        let level2: Vec<String> = texts
            .iter()
            .filter(|t| t.heading_level == Some(2))
            .map(|t| t.text())
            .collect();
        assert_eq!(level2, vec!["Title，功能代碼:001".to_string()]);
        assert!(texts.iter().any(|t| t.text() == "查詢條件為：ID > 5"));
        assert!(texts.iter().any(|t| t.text().contains("最後再點選「Title」")));
    }

    #[test]
    fn every_text_run_gets_both_fonts() {
        let (config, layout) = (AssemblyConfig::default(), SectionLayout::builtin());
        let assembler = SectionAssembler::new(&config, &layout);
        let mut doc = Document::blank();
        assembler
            .assemble(&mut doc, &descriptor("missing"), Path::new("/nonexistent/folder"))
            .unwrap();

        for text in doc.blocks().iter().filter_map(Block::as_text) {
            for run in &text.runs {
                let fonts = run.fonts.as_ref().unwrap();
                assert_eq!(fonts.latin, "Times New Roman");
                assert_eq!(fonts.east_asia, "標楷體");
            }
        }
    }

    #[test]
    fn empty_folder_yields_eleven_slot_warnings() {
        let (config, layout) = (AssemblyConfig::default(), SectionLayout::builtin());
        let assembler = SectionAssembler::new(&config, &layout);
        let dir = folder_with_images(0);
        let mut doc = Document::blank();

        let report = assembler.assemble(&mut doc, &descriptor("001"), dir.path()).unwrap();

        assert_eq!(report.warnings, 11);
        assert!(!report.folder_missing);
        assert_eq!(image_count(&doc), 0);
        let found = warnings(&doc);
        assert_eq!(found.len(), 11);
        assert_eq!(found[0], "（警告：此處缺少第 1 張圖片）");
        assert_eq!(found[10], "（警告：此處缺少第 11 張圖片）");
    }

    #[test]
    fn missing_folder_adds_one_folder_warning() {
        let (config, layout) = (AssemblyConfig::default(), SectionLayout::builtin());
        let assembler = SectionAssembler::new(&config, &layout);
        let root = tempfile::tempdir().unwrap();
        let mut doc = Document::blank();

        let report = assembler
            .assemble(&mut doc, &descriptor("001"), &root.path().join("001"))
            .unwrap();

        assert!(report.folder_missing);
        assert_eq!(report.warnings, 12);
        let found = warnings(&doc);
        assert_eq!(found[0], "警告：找不到與 001 對應的圖片資料夾。");
        assert_eq!(found.len(), 12);
        assert_eq!(image_count(&doc), 0);
    }

    #[test]
    fn partial_folder_warns_for_remaining_slots() {
        let (config, layout) = (AssemblyConfig::default(), SectionLayout::builtin());
        let assembler = SectionAssembler::new(&config, &layout);
        let dir = folder_with_images(4);
        let mut doc = Document::blank();

        let report = assembler.assemble(&mut doc, &descriptor("001"), dir.path()).unwrap();

        assert_eq!(report.images, 4);
        assert_eq!(report.warnings, 7);
        assert_eq!(warnings(&doc)[0], "（警告：此處缺少第 5 張圖片）");
    }

    #[test]
    fn corrupt_image_becomes_centered_warning() {
        let (config, layout) = (AssemblyConfig::default(), SectionLayout::builtin());
        let assembler = SectionAssembler::new(&config, &layout);
        let dir = folder_with_images(11);
        fs::write(dir.path().join("01.png"), b"garbage").unwrap();
        let mut doc = Document::blank();

        let report = assembler.assemble(&mut doc, &descriptor("001"), dir.path()).unwrap();

        assert_eq!(report.images, 10);
        assert_eq!(report.warnings, 1);
        let warning = doc
            .blocks()
            .iter()
            .filter_map(Block::as_text)
            .find(|t| t.text().contains("警告"))
            .unwrap();
        assert!(warning.text().starts_with("（警告：處理第 1 張圖片時發生錯誤: 01.png"));
        assert_eq!(warning.alignment, Alignment::Center);
    }

    #[test]
    fn assembling_twice_doubles_the_content() {
        let (config, layout) = (AssemblyConfig::default(), SectionLayout::builtin());
        let assembler = SectionAssembler::new(&config, &layout);
        let dir = folder_with_images(3);
        let mut doc = Document::blank();

        assembler.assemble(&mut doc, &descriptor("001"), dir.path()).unwrap();
        let once = doc.len();
        assembler.assemble(&mut doc, &descriptor("001"), dir.path()).unwrap();

        assert_eq!(doc.len(), once * 2);
        assert_eq!(doc.blocks()[..once], doc.blocks()[once..]);
    }

    #[test]
    fn lists_only_images_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.jpeg", "notes.txt", "d.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg"]);
    }

    #[test]
    fn traversal_folder_ids_are_rejected() {
        let root = Path::new("/srv/images");
        assert_eq!(resolve_image_folder(root, "001"), Some(root.join("001")));
        assert_eq!(resolve_image_folder(root, ""), Some(root.to_path_buf()));
        assert_eq!(resolve_image_folder(root, "../etc"), None);
        assert_eq!(resolve_image_folder(root, "/etc"), None);
    }

    #[test]
    fn traversal_folder_id_is_reported_missing() {
        let (config, layout) = (AssemblyConfig::default(), SectionLayout::builtin());
        let assembler = SectionAssembler::new(&config, &layout);
        let root = tempfile::tempdir().unwrap();
        let mut doc = Document::blank();

        let report = assembler
            .assemble_under(&mut doc, &descriptor("../outside"), root.path())
            .unwrap();
        assert!(report.folder_missing);
        assert_eq!(report.images, 0);
    }
}
