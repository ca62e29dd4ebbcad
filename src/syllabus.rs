//! System instruction ("syllabus") loading.
//!
//! The syllabus file is sent verbatim as the system instruction. Its first
//! line, minus any leading `#` markers, is shown as the syllabus version.

use std::path::Path;

use tracing::{debug, warn};

/// Instruction used when the syllabus file is missing.
pub const FALLBACK_INSTRUCTION: &str = "You are an assistant for the course.";
/// Version label used with [`FALLBACK_INSTRUCTION`].
pub const FALLBACK_VERSION: &str = "v0.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syllabus {
    pub instruction: String,
    pub version: String,
}

impl Syllabus {
    pub fn from_text(text: &str) -> Self {
        Self {
            instruction: text.to_string(),
            version: version_label(text),
        }
    }

    pub fn fallback() -> Self {
        Self {
            instruction: FALLBACK_INSTRUCTION.to_string(),
            version: FALLBACK_VERSION.to_string(),
        }
    }
}

/// First line with `#` heading markers and surrounding whitespace removed.
pub fn version_label(text: &str) -> String {
    text.lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('#')
        .trim()
        .to_string()
}

/// Load the syllabus, falling back to a generic instruction when the file
/// does not exist. Other read errors are returned.
pub fn load_syllabus(path: &Path) -> anyhow::Result<Syllabus> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let syllabus = Syllabus::from_text(&text);
            debug!(path = %path.display(), version = %syllabus.version, "syllabus loaded");
            Ok(syllabus)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "syllabus not found; using fallback instruction");
            Ok(Syllabus::fallback())
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("Failed to read syllabus: {}", path.display()))),
    }
}
