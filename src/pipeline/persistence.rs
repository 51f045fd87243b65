// Versioned JSON document for exporting and importing patterns.
//
// Import is deliberately forgiving: unknown fields are ignored, missing
// non-structural fields fall back to defaults, and out-of-range numbers are
// clamped. Only structural problems (absent or wrongly-sized grids, broken
// JSON) are rejected, and then the caller's pattern is left untouched.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::pipeline::pattern::Pattern;

/// Bumped when the document layout changes shape.
pub const DOCUMENT_VERSION: u32 = 1;

const FILE_EXTENSION: &str = "json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(flatten)]
    pub pattern: Pattern,
}

fn current_version() -> u32 {
    DOCUMENT_VERSION
}

pub fn export_document(pattern: &Pattern) -> Document {
    Document {
        version: DOCUMENT_VERSION,
        pattern: pattern.clone(),
    }
}

pub fn export_json(pattern: &Pattern) -> Result<String> {
    Ok(serde_json::to_string_pretty(&export_document(pattern))?)
}

/// Validate a parsed document and produce a playable pattern.
pub fn import_document(doc: Document) -> Pattern {
    if doc.version > DOCUMENT_VERSION {
        // best effort: newer documents load with whatever fields we know
        log::warn!(
            "document version {} is newer than supported version {}; importing best-effort",
            doc.version,
            DOCUMENT_VERSION
        );
    }
    let mut pattern = doc.pattern;
    pattern.clamp_all();
    pattern
}

pub fn import_json(json: &str) -> Result<Pattern> {
    let doc: Document =
        serde_json::from_str(json).map_err(|e| EngineError::InvalidDocument {
            reason: e.to_string(),
        })?;
    Ok(import_document(doc))
}

/// `pattern-<ISO date>`, the suggested name for a fresh export.
pub fn default_file_name() -> String {
    format!("pattern-{}", chrono::Local::now().format("%Y-%m-%d"))
}

// <dir>/<name>.json
fn document_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{FILE_EXTENSION}"))
}

pub fn save_to_file(dir: &Path, name: &str, pattern: &Pattern) -> Result<PathBuf> {
    let path = document_path(dir, name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, export_json(pattern)?)?;
    log::info!("saved pattern to {}", path.display());
    Ok(path)
}

pub fn load_from_file(path: &Path) -> Result<Pattern> {
    let data = std::fs::read_to_string(path)?;
    import_json(&data)
}
