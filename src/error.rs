use std::path::PathBuf;

pub type Result<T, E = AssemblyError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// The configuration sheet produced no section rows.
    #[error("Excel 沒有有效資料列")]
    EmptyConfiguration,

    #[error("failed to open template {path}: {message}")]
    Template { path: PathBuf, message: String },

    #[error("failed to read configuration sheet {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("invalid image archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to read document {path}: {message}")]
    Inspect { path: PathBuf, message: String },

    #[error("failed to load config file {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("failed to save document {path}: {message}")]
    Save { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AssemblyError {
    /// Errors caused by the uploaded inputs rather than by the server.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AssemblyError::EmptyConfiguration
                | AssemblyError::Template { .. }
                | AssemblyError::Spreadsheet { .. }
                | AssemblyError::Archive { .. }
        )
    }
}
