//! Prompt templates
//!
//! The template set is compiled into the binary. Placeholders are written
//! as `{{name}}` and filled from a `PromptContext` in a single pass, so text
//! coming from a document can never introduce new placeholders.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("valid placeholder pattern"));

/// Names of the values a template can reference
pub mod keys {
    pub const OCR_TEXT: &str = "ocr_text";
    pub const DIRECTORY_STRUCTURE: &str = "directory_structure";
    pub const DOCFILES: &str = "docfiles";
    pub const EXAMPLE_FILENAMES: &str = "example_filenames";
    pub const CURRENT_DATE: &str = "current_date";
    pub const TOP_LEVEL_DIRECTORIES: &str = "top_level_directories";
    pub const OCR_SUMMARY: &str = "ocr_summary";
    pub const SUGGESTED_FILENAME: &str = "suggested_filename";
}

/// The fixed template set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    SummarizeFile,
    GenerateFilename,
    SuggestPath,
    ClassifyFile,
    ExtractImageContent,
}

impl PromptTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SummarizeFile => "summarize-file",
            Self::GenerateFilename => "generate-filename",
            Self::SuggestPath => "suggest-path",
            Self::ClassifyFile => "classify-file",
            Self::ExtractImageContent => "extract-image-content",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Self::SummarizeFile => include_str!("templates/summarize-file.txt"),
            Self::GenerateFilename => include_str!("templates/generate-filename.txt"),
            Self::SuggestPath => include_str!("templates/suggest-path.txt"),
            Self::ClassifyFile => include_str!("templates/classify-file.txt"),
            Self::ExtractImageContent => include_str!("templates/extract-image-content.txt"),
        }
    }

    /// Placeholder names referenced by this template
    pub fn placeholders(&self) -> Vec<&'static str> {
        PLACEHOLDER
            .captures_iter(self.text())
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Fill the template from `context`
    ///
    /// Unknown placeholders are left in place and logged.
    pub fn fill(&self, context: &PromptContext) -> String {
        PLACEHOLDER
            .replace_all(self.text(), |caps: &Captures| {
                let key = &caps[1];
                match context.get(key) {
                    Some(value) => value.to_string(),
                    None => {
                        tracing::warn!(
                            "[Prompts] Template {} references unset value '{}'",
                            self.name(),
                            key
                        );
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}

/// Values accumulated while a file moves through the pipeline
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    values: HashMap<&'static str, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
