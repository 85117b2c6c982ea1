//! Export of assignment views as a portable JSON document

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::AssignmentView;

/// Document format version
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Default file name used by the command-line driver
pub const DEFAULT_EXPORT_FILE: &str = "ministering-assignments.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: u32,
    pub count: usize,
    pub assignments: Vec<AssignmentView>,
}

impl ExportDocument {
    pub fn new(assignments: Vec<AssignmentView>) -> Self {
        Self {
            version: EXPORT_FORMAT_VERSION,
            count: assignments.len(),
            assignments,
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Serialize into any sink (file, pipe, buffer)
    pub fn write_json<W: Write>(&self, mut writer: W, pretty: bool) -> Result<()> {
        if pretty {
            serde_json::to_writer_pretty(&mut writer, self)?;
        } else {
            serde_json::to_writer(&mut writer, self)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
