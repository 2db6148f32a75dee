use crate::config::AssemblyConfig;
use crate::core::assembler::SectionAssembler;
use crate::core::document::Document;
use crate::core::layout::SectionLayout;
use crate::core::parser::{Parser, XlsxConfigParser};
use crate::utils::archive::extract_images;
use crate::{AssemblyError, Result, SectionDescriptor};
use log::{debug, info};
use serde::Serialize;
use std::path::Path;

/// Totals over one generated document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub sections: usize,
    pub images: usize,
    pub warnings: usize,
    pub missing_folders: usize,
}

/// Runs the whole pipeline: configuration sheet → sections → document.
pub struct DocumentProcessor {
    parser: XlsxConfigParser,
    config: AssemblyConfig,
    layout: SectionLayout,
}

impl DocumentProcessor {
    pub fn new(config: AssemblyConfig, layout: SectionLayout) -> Self {
        Self {
            parser: XlsxConfigParser::new(config.chapter_number.clone()),
            config,
            layout,
        }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Parse the configuration sheet, rejecting one without section rows.
    pub fn load_sections(&self, config_sheet: &Path) -> Result<Vec<SectionDescriptor>> {
        let sections = self.parser.parse(config_sheet)?;
        if sections.is_empty() {
            return Err(AssemblyError::EmptyConfiguration);
        }
        Ok(sections)
    }

    /// Generate from an already extracted image directory.
    pub fn process(
        &self,
        template: &Path,
        config_sheet: &Path,
        image_root: &Path,
        output: &Path,
    ) -> Result<GenerationReport> {
        let sections = self.load_sections(config_sheet)?;
        self.render(template, &sections, image_root, output)
    }

    /// Generate from a zip of screenshots, extracting it under `extract_dir`.
    /// The sheet is validated before the archive is touched.
    pub fn process_archive(
        &self,
        template: &Path,
        config_sheet: &Path,
        images_zip: &Path,
        extract_dir: &Path,
        output: &Path,
    ) -> Result<GenerationReport> {
        let sections = self.load_sections(config_sheet)?;
        let image_root = extract_images(images_zip, extract_dir)?;
        self.render(template, &sections, &image_root, output)
    }

    /// Open the template, append one section per descriptor and save.
    pub fn render(
        &self,
        template: &Path,
        sections: &[SectionDescriptor],
        image_root: &Path,
        output: &Path,
    ) -> Result<GenerationReport> {
        info!(
            "Assembling {} section(s) into {} using images under {}",
            sections.len(),
            template.display(),
            image_root.display()
        );

        let mut doc = Document::open(template)?
            .with_heading_style_prefix(self.config.heading_style_prefix.clone());
        let assembler = SectionAssembler::new(&self.config, &self.layout);

        let mut report = GenerationReport::default();
        for section in sections {
            let section_report = assembler.assemble_under(&mut doc, section, image_root)?;
            debug!("Section {} -> {:?}", section.base_label, section_report);
            report.sections += 1;
            report.images += section_report.images;
            report.warnings += section_report.warnings;
            if section_report.folder_missing {
                report.missing_folders += 1;
            }
        }

        doc.save(output)?;
        info!(
            "Saved {} ({} section(s), {} image(s), {} warning(s))",
            output.display(),
            report.sections,
            report.images,
            report.warnings
        );
        Ok(report)
    }
}
