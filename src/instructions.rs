//! Per-document extraction instructions, keyed by file name.
//!
//! A store answers "what should be pulled out of `invoice-2024.pdf`?" with a
//! prompt, an example of the expected JSON and the field name the answer is
//! stored under. Documents without an entry get no field extraction.

use crate::error::TriageError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Extraction instructions for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInstructions {
    pub prompt: String,
    #[serde(default)]
    pub example: String,
    #[serde(alias = "fieldname")]
    pub field_name: String,
}

/// Keyed lookup of [`DocumentInstructions`].
pub trait InstructionStore: Send + Sync {
    fn lookup(&self, filename: &str) -> Option<DocumentInstructions>;
}

/// In-memory [`InstructionStore`].
///
/// The JSON form is an object keyed by file name:
///
/// ```json
/// { "invoice.pdf": { "prompt": "Get the total", "example": "{\"total\": 0}", "field_name": "invoice" } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryInstructionStore {
    entries: HashMap<String, DocumentInstructions>,
}

impl MemoryInstructionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, instructions: DocumentInstructions) {
        self.entries.insert(filename.into(), instructions);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, TriageError> {
        let entries: HashMap<String, DocumentInstructions> = serde_json::from_str(json)
            .map_err(|e| TriageError::InvalidConfig(format!("instruction store JSON: {e}")))?;
        Ok(Self { entries })
    }

    pub fn from_file(path: &Path) -> Result<Self, TriageError> {
        let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TriageError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => TriageError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => TriageError::InvalidConfig(format!("cannot read {}: {e}", path.display())),
        })?;
        Self::from_json(&json)
    }
}

impl InstructionStore for MemoryInstructionStore {
    fn lookup(&self, filename: &str) -> Option<DocumentInstructions> {
        self.entries.get(filename).cloned()
    }
}
