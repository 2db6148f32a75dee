pub mod core {
    pub mod parser;
    pub mod layout;
    pub mod document;
    pub mod assembler;
    pub mod outline;
}

pub mod utils {
    pub mod archive;
    pub mod session;
    pub mod document_processor;
}

pub mod config;
pub mod error;
pub mod server;

pub use error::{AssemblyError, Result};

use serde::{Deserialize, Serialize};

/// One configuration row, parsed and ready to drive one document section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionDescriptor {
    /// 1-based position among emitted descriptors.
    pub sequence_index: usize,
    /// `"{chapter}.{sequence_index}"`, kept for numbering schemes; not rendered.
    pub base_label: String,
    /// Name of the image sub-folder for this section. May be empty.
    pub folder_id: String,
    pub title: String,
    pub query_condition: String,
    /// 1-based spreadsheet row the descriptor came from.
    pub source_row: usize,
}
