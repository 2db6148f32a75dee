use crate::{AssemblyError, Result};
use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Pic, Run, RunFonts, Style, StyleType, Styles};
use image::error::{LimitError, LimitErrorKind};
use image::{GenericImageView, ImageError, ImageFormat};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    /// Whatever the paragraph style says.
    #[default]
    Inherit,
    Left,
    Center,
    Right,
}

/// Latin and East-Asian font faces for one text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontPair {
    pub latin: String,
    pub east_asia: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub fonts: Option<FontPair>,
}

/// A body paragraph or heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub heading_level: Option<u8>,
    pub alignment: Alignment,
    pub runs: Vec<TextRun>,
}

impl TextBlock {
    fn new(text: &str, heading_level: Option<u8>) -> Self {
        let runs = if text.is_empty() {
            Vec::new()
        } else {
            vec![TextRun { text: text.to_string(), fonts: None }]
        };
        Self { heading_level, alignment: Alignment::Inherit, runs }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn align(&mut self, alignment: Alignment) -> &mut Self {
        self.alignment = alignment;
        self
    }

    /// Set the font faces of the runs that exist right now.
    pub fn set_fonts(&mut self, fonts: &FontPair) -> &mut Self {
        for run in &mut self.runs {
            run.fonts = Some(fonts.clone());
        }
        self
    }
}

/// A decoded picture, stored as PNG and sized in EMUs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlock {
    pub source: PathBuf,
    pub png: Vec<u8>,
    pub pixel_size: (u32, u32),
    pub extent_emu: (u32, u32),
    pub alignment: Alignment,
}

impl ImageBlock {
    pub fn align(&mut self, alignment: Alignment) -> &mut Self {
        self.alignment = alignment;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    PageBreak,
    Text(TextBlock),
    Image(ImageBlock),
}

impl Block {
    pub fn as_text(&self) -> Option<&TextBlock> {
        match self {
            Block::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// A Word document opened from a template. New content is only ever
/// appended after the template body and is written out by [`Document::save`].
pub struct Document {
    base: Docx,
    blocks: Vec<Block>,
    heading_style_prefix: String,
}

impl Document {
    /// Start from an empty document.
    pub fn blank() -> Self {
        Self {
            base: Docx::new(),
            blocks: Vec::new(),
            heading_style_prefix: "Heading".to_string(),
        }
    }

    /// Open an existing `.docx` as the base for new content.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let template_err = |message: String| AssemblyError::Template {
            path: path.to_path_buf(),
            message,
        };

        let bytes = fs::read(path).map_err(|e| template_err(e.to_string()))?;
        let base = docx_rs::read_docx(&bytes).map_err(|e| template_err(e.to_string()))?;
        Ok(Self { base, ..Self::blank() })
    }

    /// Style id used for a heading of `level`: the template's `heading N`
    /// paragraph style when it defines one, `{prefix}{level}` otherwise.
    pub fn heading_style_id(&self, level: u8) -> String {
        template_heading_styles(&self.base.styles)
            .remove(&level)
            .unwrap_or_else(|| format!("{}{}", self.heading_style_prefix, level))
    }

    /// Prefix for heading styles the template does not define.
    pub fn with_heading_style_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.heading_style_prefix = prefix.into();
        self
    }

    /// Content appended since the document was opened.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn append_page_break(&mut self) {
        self.blocks.push(Block::PageBreak);
    }

    pub fn append_heading(&mut self, text: &str, level: u8) -> &mut TextBlock {
        self.push_text(TextBlock::new(text, Some(level)))
    }

    pub fn append_paragraph(&mut self, text: &str) -> &mut TextBlock {
        self.push_text(TextBlock::new(text, None))
    }

    /// Read and decode `path`, then append it scaled to `width_emu`, keeping
    /// the aspect ratio. Nothing is appended when the image cannot be used.
    pub fn append_image<P: AsRef<Path>>(&mut self, path: P, width_emu: u32) -> Result<&mut ImageBlock> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| AssemblyError::ImageRead {
            path: path.to_path_buf(),
            source,
        })?;
        let decode_err = |source: image::ImageError| AssemblyError::ImageDecode {
            path: path.to_path_buf(),
            source,
        };

        let decoded = image::load_from_memory(&bytes).map_err(decode_err)?;
        let (width_px, height_px) = decoded.dimensions();

        let png = if image::guess_format(&bytes).ok() == Some(ImageFormat::Png) {
            bytes
        } else {
            let mut buf = Vec::new();
            decoded
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(decode_err)?;
            buf
        };

        let height_emu = u64::from(width_emu) * u64::from(height_px) / u64::from(width_px.max(1));
        let height_emu = u32::try_from(height_emu)
            .map_err(|_| decode_err(ImageError::Limits(LimitError::from_kind(LimitErrorKind::DimensionError))))?;
        self.blocks.push(Block::Image(ImageBlock {
            source: path.to_path_buf(),
            png,
            pixel_size: (width_px, height_px),
            extent_emu: (width_emu, height_emu),
            alignment: Alignment::Inherit,
        }));
        match self.blocks.last_mut() {
            Some(Block::Image(block)) => Ok(block),
            _ => unreachable!("image block was just pushed"),
        }
    }

    fn push_text(&mut self, block: TextBlock) -> &mut TextBlock {
        self.blocks.push(Block::Text(block));
        match self.blocks.last_mut() {
            Some(Block::Text(block)) => block,
            _ => unreachable!("text block was just pushed"),
        }
    }

    /// Write the template plus all appended content to `path`.
    pub fn save<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let path = path.as_ref();
        let Document { mut base, blocks, heading_style_prefix } = self;

        let levels: BTreeSet<u8> = blocks
            .iter()
            .filter_map(|b| b.as_text().and_then(|t| t.heading_level))
            .collect();
        let mut defined = template_heading_styles(&base.styles);
        let mut style_ids = BTreeMap::new();
        for level in levels {
            let id = match defined.remove(&level) {
                Some(id) => id,
                None => {
                    let id = format!("{}{}", heading_style_prefix, level);
                    if base.styles.find_style_by_id(&id).is_none() {
                        base = base.add_style(heading_style(&id, level));
                    }
                    id
                }
            };
            style_ids.insert(level, id);
        }

        let docx = blocks
            .into_iter()
            .fold(base, |docx, block| docx.add_paragraph(to_paragraph(block, &style_ids)));

        let file = File::create(path)?;
        docx.build().pack(file).map_err(|e| AssemblyError::Save {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Paragraph styles named `heading N` (any case), keyed by level. The first
/// definition of a level wins.
fn template_heading_styles(styles: &Styles) -> BTreeMap<u8, String> {
    let levels_by_id = styles.create_heading_style_map();
    let mut by_level = BTreeMap::new();
    for style in &styles.styles {
        if style.style_type != StyleType::Paragraph {
            continue;
        }
        let level = levels_by_id
            .get(&style.style_id)
            .and_then(|&n| u8::try_from(n).ok());
        if let Some(level) = level {
            by_level.entry(level).or_insert_with(|| style.style_id.clone());
        }
    }
    by_level
}

/// A minimal `heading N` style for templates that lack one.
fn heading_style(style_id: &str, level: u8) -> Style {
    Style::new(style_id, StyleType::Paragraph)
        .name(format!("heading {}", level))
        .bold()
        .outline_lvl(usize::from(level.saturating_sub(1)))
}

fn to_paragraph(block: Block, heading_styles: &BTreeMap<u8, String>) -> Paragraph {
    match block {
        Block::PageBreak => Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
        Block::Text(text) => {
            let mut paragraph = Paragraph::new();
            if let Some(level) = text.heading_level {
                if let Some(style_id) = heading_styles.get(&level) {
                    paragraph = paragraph.style(style_id);
                }
            }
            for run in text.runs {
                let mut r = Run::new().add_text(run.text);
                if let Some(fonts) = run.fonts {
                    r = r.fonts(
                        RunFonts::new()
                            .ascii(&fonts.latin)
                            .hi_ansi(&fonts.latin)
                            .east_asia(&fonts.east_asia),
                    );
                }
                paragraph = paragraph.add_run(r);
            }
            align(paragraph, text.alignment)
        }
        Block::Image(img) => {
            let (w_px, h_px) = img.pixel_size;
            let (w_emu, h_emu) = img.extent_emu;
            let pic = Pic::new_with_dimensions(img.png, w_px, h_px).size(w_emu, h_emu);
            align(Paragraph::new().add_run(Run::new().add_image(pic)), img.alignment)
        }
    }
}

fn align(paragraph: Paragraph, alignment: Alignment) -> Paragraph {
    match alignment {
        Alignment::Inherit => paragraph,
        Alignment::Left => paragraph.align(AlignmentType::Left),
        Alignment::Center => paragraph.align(AlignmentType::Center),
        Alignment::Right => paragraph.align(AlignmentType::Right),
    }
}
