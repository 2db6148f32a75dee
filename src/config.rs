use crate::{AssemblyError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// English Metric Units per centimetre, as used by DrawingML extents.
pub const EMU_PER_CM: f64 = 360_000.0;

/// Settings that shape every assembled section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Chapter prefix of each descriptor's `base_label`.
    pub chapter_number: String,
    /// Every inserted screenshot is scaled to this width.
    pub image_width_cm: f64,
    pub latin_font: String,
    pub east_asia_font: String,
    /// Style id `{prefix}{level}` (e.g. `Heading2`) for heading levels the
    /// template has no `heading N` style for.
    pub heading_style_prefix: String,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            chapter_number: "1".to_string(),
            image_width_cm: 17.98,
            latin_font: "Times New Roman".to_string(),
            east_asia_font: "標楷體".to_string(),
            heading_style_prefix: "Heading".to_string(),
        }
    }
}

impl AssemblyConfig {
    /// Load overrides from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| AssemblyError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn image_width_emu(&self) -> u32 {
        (self.image_width_cm * EMU_PER_CM).round() as u32
    }
}

/// Settings for the HTTP boundary.
#[derive(Debug, Clone, clap::Args)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "ASSEMBLER_ADDR", default_value = "0.0.0.0:8000")]
    pub addr: SocketAddr,

    /// Directory that holds one sub-directory per request
    #[arg(long, env = "ASSEMBLER_WORK_DIR", default_value = "temp")]
    pub work_dir: PathBuf,

    /// Directory with index.html and static assets
    #[arg(long, env = "ASSEMBLER_FRONTEND_DIR", default_value = "frontend")]
    pub frontend_dir: PathBuf,

    /// Upper bound for one upload request, in MiB
    #[arg(long, env = "ASSEMBLER_MAX_UPLOAD_MB", default_value_t = 200)]
    pub max_upload_mb: usize,
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
