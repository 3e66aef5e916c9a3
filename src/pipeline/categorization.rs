//! Proposed destination of one document
//!
//! Produced from model JSON, then cleaned and retyped before placement.

use crate::ai::json::string_field;
use crate::error::{DocsortError, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Longest filename kept after cleaning, in characters
pub const MAX_FILENAME_CHARS: usize = 255;

/// Punctuation allowed in names besides letters, digits and space
const ALLOWED_PUNCTUATION: &str = "-_.,()&'+[]";

fn is_allowed(c: char) -> bool {
    c.is_alphanumeric() || c == ' ' || ALLOWED_PUNCTUATION.contains(c)
}

/// Keep allow-listed characters, trimmed
fn clean_segment(segment: &str) -> String {
    let kept: String = segment.chars().filter(|c| is_allowed(*c)).collect();
    kept.trim().to_string()
}

/// Filename with separators, disallowed characters and leading dots removed,
/// cut to `MAX_FILENAME_CHARS`
fn clean_name(name: &str) -> String {
    let kept: String = name
        .replace(['/', '\\'], " ")
        .chars()
        .filter(|c| is_allowed(*c))
        .collect();
    let kept: String = kept
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();
    kept.trim_end().to_string()
}

/// `filename` field of a model response; must survive cleaning
pub fn read_filename(object: &Map<String, Value>) -> Result<String> {
    let filename = string_field(object, "filename").ok_or_else(|| {
        DocsortError::MalformedOutput("No filename found in response JSON".to_string())
    })?;
    if clean_name(&filename).is_empty() {
        return Err(DocsortError::MalformedOutput(format!(
            "Filename has no usable characters: {:?}",
            filename
        )));
    }
    Ok(filename)
}

/// `path` field of a model response; empty means the destination root
pub fn read_path(object: &Map<String, Value>) -> Result<String> {
    object
        .get("path")
        .and_then(Value::as_str)
        .map(|path| path.trim().to_string())
        .ok_or_else(|| DocsortError::MalformedOutput("No path found in response JSON".to_string()))
}

/// Relative directory plus filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorization {
    /// Slash-separated, relative to the destination root; may be empty
    pub path: String,
    pub filename: String,
}

impl Categorization {
    pub fn new(path: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
        }
    }

    /// Read both `path` and `filename` from a model response object
    pub fn from_json(object: &Map<String, Value>) -> Result<Self> {
        Ok(Self::new(read_path(object)?, read_filename(object)?))
    }

    /// Force the filename's extension to `extension`
    ///
    /// Accepts a bare extension (`jpg`), a dotted one (`.jpg`) or a whole
    /// filename (`scan.jpg`); everything after the last dot is used. The stem
    /// is shortened when needed to stay within `MAX_FILENAME_CHARS`.
    pub fn retype(self, extension: &str) -> Self {
        let extension = match extension.rfind('.') {
            Some(index) => &extension[index + 1..],
            None => extension,
        };
        if extension.is_empty() {
            return self;
        }

        let stem = match self.filename.rfind('.') {
            Some(index) => &self.filename[..index],
            None => self.filename.as_str(),
        };
        let budget = MAX_FILENAME_CHARS.saturating_sub(extension.chars().count() + 1);
        let stem: String = stem.chars().take(budget).collect();
        let filename = format!("{}.{}", stem, extension);

        Self {
            path: self.path,
            filename,
        }
    }

    /// Strip disallowed characters and traversal from both parts
    ///
    /// The filename loses every separator and is cut to
    /// `MAX_FILENAME_CHARS`. The path keeps its `/` structure but drops
    /// empty, `.` and `..` segments.
    pub fn clean_filename(self) -> Self {
        let filename = clean_name(&self.filename);

        let path = self
            .path
            .replace('\\', "/")
            .split('/')
            .map(clean_segment)
            .filter(|segment| !segment.is_empty() && !segment.chars().all(|c| c == '.'))
            .collect::<Vec<_>>()
            .join("/");

        Self { path, filename }
    }

    /// Target directory relative to the destination root
    pub fn relative_dir(&self) -> PathBuf {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

impl fmt::Display for Categorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.filename)
        } else {
            write!(f, "{}/{}", self.path, self.filename)
        }
    }
}
