//! Categorization Pipeline
//!
//! Per file, strictly forward:
//! 1. Extract: text extraction plus normalization (2000 char cap)
//! 2. Summarize: free-form summary, thinking markup stripped
//! 3. Filename: JSON `{"filename": ...}`, retried
//! 4. Path: JSON `{"path": ...}`, retried
//!
//! `PipelineMode::Combined` replaces stages 2-4 with one classification call
//! that must return both fields and is not retried. Both modes share
//! extraction, context building and the final clean/retype step.

pub mod categorization;

pub use categorization::Categorization;

use categorization::{read_filename, read_path};

use crate::ai::client::{TextCompletion, DEFAULT_TEMPERATURE};
use crate::ai::json::{extract_json_object, filter_thinking};
use crate::ai::prompts::{keys, PromptContext, PromptTemplate};
use crate::config::PipelineMode;
use crate::error::{DocsortError, Result};
use crate::extract::{normalize, TextExtractor};
use crate::tree::DirectoryTree;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Extracted text is cut to this many characters before prompting
pub const MAX_TEXT_CHARS: usize = 2000;

/// Sampled filenames shown to the model as naming precedent
pub const EXAMPLE_FILE_COUNT: usize = 4;

/// Attempts for the filename and path stages
pub const STAGE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Summarize,
    Filename,
    Path,
    Classify,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Summarize => "summarize",
            Self::Filename => "filename",
            Self::Path => "path",
            Self::Classify => "classify",
        }
    }
}

/// Progress notifications, emitted as the pipeline runs
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageFinished {
        stage: Stage,
        details: String,
        elapsed: Duration,
    },
    AttemptFailed {
        stage: Stage,
        attempt: usize,
        attempts: usize,
        message: String,
    },
}

/// Turns one source file into a cleaned, retyped `Categorization`
pub struct Categorizer {
    completion: Arc<dyn TextCompletion>,
    tree: Arc<DirectoryTree>,
    extractor: TextExtractor,
    mode: PipelineMode,
    temperature: f32,
}

impl Categorizer {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        tree: Arc<DirectoryTree>,
        extractor: TextExtractor,
        mode: PipelineMode,
    ) -> Self {
        Self {
            completion,
            tree,
            extractor,
            mode,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn extractor(&self) -> &TextExtractor {
        &self.extractor
    }

    /// Categorize without progress reporting
    pub async fn categorize(&self, source: &Path) -> Result<Categorization> {
        self.categorize_with(source, &mut |_| {}).await
    }

    /// Categorize `source`, reporting each finished stage and failed attempt
    pub async fn categorize_with(
        &self,
        source: &Path,
        on_event: &mut (dyn FnMut(PipelineEvent) + Send),
    ) -> Result<Categorization> {
        tracing::info!(
            "[Categorizer] {} ({} mode)",
            source.display(),
            self.mode.as_str()
        );

        // Extraction failures are not retried
        let started = Instant::now();
        let raw = self.extractor.extract(source).await?;
        let text = normalize(&raw, MAX_TEXT_CHARS);
        on_event(PipelineEvent::StageFinished {
            stage: Stage::Extract,
            details: format!("{} chars", text.chars().count()),
            elapsed: started.elapsed(),
        });

        let mut context = self.build_context(&text)?;

        let categorization = match self.mode {
            PipelineMode::Staged => self.run_staged(&mut context, on_event).await?,
            PipelineMode::Combined => self.run_combined(&context, on_event).await?,
        };

        let finished = finish(categorization, source);
        tracing::info!("[Categorizer] {} -> {}", source.display(), finished);
        Ok(finished)
    }

    /// Prompt values shared by every stage
    pub fn build_context(&self, text: &str) -> Result<PromptContext> {
        let tree = self.tree.as_ref();

        let notes = tree
            .notes()
            .into_iter()
            .map(|(path, note)| format!("{} --> {}", path, note.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        let examples = tree.example_filenames(EXAMPLE_FILE_COUNT);

        let mut context = PromptContext::new();
        context
            .set(keys::OCR_TEXT, text)
            .set(
                keys::DIRECTORY_STRUCTURE,
                serde_json::to_string_pretty(&tree.short_summary())?,
            )
            .set(keys::DOCFILES, notes)
            .set(
                keys::EXAMPLE_FILENAMES,
                serde_json::to_string_pretty(&tree.example_filenames_json(&examples))?,
            )
            .set(keys::CURRENT_DATE, current_date())
            .set(
                keys::TOP_LEVEL_DIRECTORIES,
                serde_json::to_string(&tree.top_level_names())?,
            );
        Ok(context)
    }

    async fn run_staged(
        &self,
        context: &mut PromptContext,
        on_event: &mut (dyn FnMut(PipelineEvent) + Send),
    ) -> Result<Categorization> {
        let started = Instant::now();
        let prompt = PromptTemplate::SummarizeFile.fill(context);
        let summary = self
            .completion
            .generate_text(&prompt, self.temperature)
            .await
            .map(|response| filter_thinking(&response))
            .map_err(|e| stage_failed(Stage::Summarize, 1, e))?;
        on_event(PipelineEvent::StageFinished {
            stage: Stage::Summarize,
            details: format!("{} chars", summary.chars().count()),
            elapsed: started.elapsed(),
        });
        context.set(keys::OCR_SUMMARY, summary);

        let started = Instant::now();
        let filename = self
            .generate_field(Stage::Filename, PromptTemplate::GenerateFilename, read_filename, context, on_event)
            .await?;
        on_event(PipelineEvent::StageFinished {
            stage: Stage::Filename,
            details: filename.clone(),
            elapsed: started.elapsed(),
        });
        context.set(keys::SUGGESTED_FILENAME, filename.clone());

        let started = Instant::now();
        let path = self
            .generate_field(Stage::Path, PromptTemplate::SuggestPath, read_path, context, on_event)
            .await?;
        on_event(PipelineEvent::StageFinished {
            stage: Stage::Path,
            details: path.clone(),
            elapsed: started.elapsed(),
        });

        Ok(Categorization::new(path, filename))
    }

    async fn run_combined(
        &self,
        context: &PromptContext,
        on_event: &mut (dyn FnMut(PipelineEvent) + Send),
    ) -> Result<Categorization> {
        let started = Instant::now();
        let categorization = self
            .request_object(PromptTemplate::ClassifyFile, context)
            .await
            .and_then(|object| Categorization::from_json(&object))
            .map_err(|e| stage_failed(Stage::Classify, 1, e))?;
        on_event(PipelineEvent::StageFinished {
            stage: Stage::Classify,
            details: categorization.to_string(),
            elapsed: started.elapsed(),
        });
        Ok(categorization)
    }

    /// Prompt with `template` until `read_field` accepts the response
    ///
    /// The prompt is refilled on every attempt from the current context.
    async fn generate_field(
        &self,
        stage: Stage,
        template: PromptTemplate,
        read_field: fn(&JsonObject) -> Result<String>,
        context: &PromptContext,
        on_event: &mut (dyn FnMut(PipelineEvent) + Send),
    ) -> Result<String> {
        let mut last_error = None;

        for attempt in 1..=STAGE_ATTEMPTS {
            let result = self
                .request_object(template, context)
                .await
                .and_then(|object| read_field(&object));

            match result {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        "[Categorizer] {} attempt {} of {} failed: {}",
                        stage.name(),
                        attempt,
                        STAGE_ATTEMPTS,
                        e
                    );
                    on_event(PipelineEvent::AttemptFailed {
                        stage,
                        attempt,
                        attempts: STAGE_ATTEMPTS,
                        message: e.to_string(),
                    });
                    last_error = Some(e);
                }
            }
        }

        let cause = last_error
            .unwrap_or_else(|| DocsortError::MalformedOutput(format!("No {} requested", stage.name())));
        Err(stage_failed(stage, STAGE_ATTEMPTS, cause))
    }

    async fn request_object(
        &self,
        template: PromptTemplate,
        context: &PromptContext,
    ) -> Result<JsonObject> {
        let prompt = template.fill(context);
        let response = self.completion.generate_text(&prompt, self.temperature).await?;
        extract_json_object(&filter_thinking(&response))
    }
}

fn stage_failed(stage: Stage, attempts: usize, cause: DocsortError) -> DocsortError {
    DocsortError::Stage {
        stage: stage.name(),
        attempts,
        source: Box::new(cause),
    }
}

/// Clean, then force the source file's extension
fn finish(categorization: Categorization, source: &Path) -> Categorization {
    let cleaned = categorization.clean_filename();
    match source.extension() {
        Some(extension) => cleaned.retype(&extension.to_string_lossy()),
        None => cleaned,
    }
}

fn current_date() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ImageToText;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Replays canned responses in order, recording the prompts it saw
    struct ScriptedCompletion {
        responses: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextCompletion for ScriptedCompletion {
        async fn generate_text(&self, prompt: &str, _temperature: f32) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| DocsortError::Service("No scripted response left".to_string()))
        }
    }

    struct NoOcr;

    #[async_trait]
    impl ImageToText for NoOcr {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn image_to_text(&self, _image: &Path) -> Result<String> {
            Ok("INVOICE 2024-03-01 Acme Corp total 42.00".to_string())
        }
    }

    struct Fixture {
        _reference: TempDir,
        sources: TempDir,
        tree: Arc<DirectoryTree>,
    }

    fn fixture() -> Fixture {
        let reference = tempdir().unwrap();
        let invoices = reference.path().join("Finance").join("Invoices");
        fs::create_dir_all(&invoices).unwrap();
        fs::write(invoices.join("2023-11-02 Invoice Hoster.pdf"), b"").unwrap();
        fs::write(reference.path().join("Finance").join(".docinfo"), "Money matters\n").unwrap();
        fs::create_dir_all(reference.path().join("Health")).unwrap();

        let tree = Arc::new(DirectoryTree::scan(reference.path()).unwrap());
        Fixture {
            _reference: reference,
            sources: tempdir().unwrap(),
            tree,
        }
    }

    fn categorizer(fixture: &Fixture, completion: Arc<ScriptedCompletion>, mode: PipelineMode) -> Categorizer {
        Categorizer::new(
            completion,
            fixture.tree.clone(),
            TextExtractor::new(Arc::new(NoOcr)),
            mode,
        )
    }

    fn failed_attempts(events: &[PipelineEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::AttemptFailed { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_staged_pipeline_happy_path() {
        let fixture = fixture();
        let source = fixture.sources.path().join("scan.jpg");
        fs::write(&source, b"jpeg bytes").unwrap();

        let completion = ScriptedCompletion::new(&[
            "<think>hmm, an invoice</think>An invoice from Acme dated 2024-03-01.",
            r#"{"filename": "2024-03-01 Invoice Acme.pdf"}"#,
            r#"Sure! {"path": "Finance/Invoices"}"#,
        ]);
        let categorizer = categorizer(&fixture, completion.clone(), PipelineMode::Staged);

        let mut events = Vec::new();
        let result = categorizer
            .categorize_with(&source, &mut |event| events.push(event))
            .await
            .unwrap();

        assert_eq!(result.path, "Finance/Invoices");
        assert_eq!(result.filename, "2024-03-01 Invoice Acme.jpg");
        assert_eq!(completion.prompt_count(), 3);
        assert_eq!(failed_attempts(&events), 0);

        let prompts = completion.prompts.lock().unwrap();
        // Summary reaches later stages with the thinking block removed
        assert!(prompts[1].contains("An invoice from Acme dated 2024-03-01."));
        assert!(!prompts[1].contains("<think>"));
        assert!(prompts[2].contains("2024-03-01 Invoice Acme.pdf"));
        assert!(prompts[0].contains("Finance --> Money matters"));
        assert!(prompts[0].contains("INVOICE 2024-03-01 Acme Corp"));
    }

    #[tokio::test]
    async fn test_filename_retry_uses_second_attempt() {
        let fixture = fixture();
        let source = fixture.sources.path().join("letter.txt");
        fs::write(&source, "Dear customer").unwrap();

        let completion = ScriptedCompletion::new(&[
            "A letter.",
            "I think the filename should be about a letter",
            r#"{"filename": "2024-02-10 Letter Bank"}"#,
            r#"{"path": "Finance"}"#,
        ]);
        let categorizer = categorizer(&fixture, completion.clone(), PipelineMode::Staged);

        let mut events = Vec::new();
        let result = categorizer
            .categorize_with(&source, &mut |event| events.push(event))
            .await
            .unwrap();

        assert_eq!(result.filename, "2024-02-10 Letter Bank.txt");
        assert_eq!(result.path, "Finance");
        assert_eq!(failed_attempts(&events), 1);
        assert!(matches!(
            events.iter().find(|e| matches!(e, PipelineEvent::AttemptFailed { .. })),
            Some(PipelineEvent::AttemptFailed { stage: Stage::Filename, attempt: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_exhausted_path_retries_name_the_stage() {
        let fixture = fixture();
        let source = fixture.sources.path().join("letter.txt");
        fs::write(&source, "Dear customer").unwrap();

        let completion = ScriptedCompletion::new(&[
            "A letter.",
            r#"{"filename": "2024-02-10 Letter Bank"}"#,
            r#"{"folder": "Finance"}"#,
            r#"{"directory": "Finance"}"#,
        ]);
        let categorizer = categorizer(&fixture, completion.clone(), PipelineMode::Staged);

        let mut events = Vec::new();
        let err = categorizer
            .categorize_with(&source, &mut |event| events.push(event))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some("path"));
        assert!(matches!(err, DocsortError::Stage { attempts: 2, .. }));
        assert_eq!(failed_attempts(&events), 2);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_combined_mode_single_call() {
        let fixture = fixture();
        let source = fixture.sources.path().join("receipt.txt");
        fs::write(&source, "Receipt 2024-01-15 Pharmacy").unwrap();

        let completion = ScriptedCompletion::new(&[
            r#"{"path": "Health", "filename": "2024-01-15 Receipt Pharmacy.pdf"}"#,
        ]);
        let categorizer = categorizer(&fixture, completion.clone(), PipelineMode::Combined);

        let result = categorizer.categorize(&source).await.unwrap();
        assert_eq!(result.to_string(), "Health/2024-01-15 Receipt Pharmacy.txt");
        assert_eq!(completion.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_combined_mode_does_not_retry() {
        let fixture = fixture();
        let source = fixture.sources.path().join("receipt.txt");
        fs::write(&source, "Receipt").unwrap();

        let completion = ScriptedCompletion::new(&[
            r#"{"path": "Health"}"#,
            r#"{"path": "Health", "filename": "never used"}"#,
        ]);
        let categorizer = categorizer(&fixture, completion.clone(), PipelineMode::Combined);

        let err = categorizer.categorize(&source).await.unwrap_err();
        assert_eq!(err.stage(), Some("classify"));
        assert_eq!(completion.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_not_wrapped() {
        let fixture = fixture();
        let completion = ScriptedCompletion::new(&[]);
        let categorizer = categorizer(&fixture, completion.clone(), PipelineMode::Staged);

        let err = categorizer
            .categorize(&fixture.sources.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocsortError::Extraction { .. }));
        assert_eq!(completion.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_unusable_filename_is_retried() {
        let fixture = fixture();
        let source = fixture.sources.path().join("letter.txt");
        fs::write(&source, "Dear customer").unwrap();

        let completion = ScriptedCompletion::new(&[
            "A letter.",
            r#"{"filename": "???"}"#,
            r#"{"filename": "2024-02-10 Letter Bank"}"#,
            r#"{"path": "Finance"}"#,
        ]);
        let categorizer = categorizer(&fixture, completion.clone(), PipelineMode::Staged);

        let mut events = Vec::new();
        let result = categorizer
            .categorize_with(&source, &mut |event| events.push(event))
            .await
            .unwrap();

        assert_eq!(result.filename, "2024-02-10 Letter Bank.txt");
        assert_eq!(failed_attempts(&events), 1);
        assert_eq!(completion.prompt_count(), 4);
    }

    #[tokio::test]
    async fn test_unusable_filename_fails_combined_mode() {
        let fixture = fixture();
        let source = fixture.sources.path().join("scan.jpg");
        fs::write(&source, b"jpeg bytes").unwrap();

        let completion = ScriptedCompletion::new(&[r#"{"path": "Health", "filename": "<>|"}"#]);
        let categorizer = categorizer(&fixture, completion, PipelineMode::Combined);

        let err = categorizer.categorize(&source).await.unwrap_err();
        assert_eq!(err.stage(), Some("classify"));
    }

    #[tokio::test]
    async fn test_empty_path_means_destination_root() {
        let fixture = fixture();
        let source = fixture.sources.path().join("note.txt");
        fs::write(&source, "Note 2024-01-01").unwrap();

        let completion = ScriptedCompletion::new(&[r#"{"path": "", "filename": "2024-01-01 Note"}"#]);
        let result = categorizer(&fixture, completion, PipelineMode::Combined)
            .categorize(&source)
            .await
            .unwrap();
        assert_eq!(result.path, "");
        assert_eq!(result.to_string(), "2024-01-01 Note.txt");

        let completion = ScriptedCompletion::new(&[
            "A note.",
            r#"{"filename": "2024-01-01 Note"}"#,
            r#"{"path": ""}"#,
        ]);
        let mut events = Vec::new();
        let result = categorizer(&fixture, completion, PipelineMode::Staged)
            .categorize_with(&source, &mut |event| events.push(event))
            .await
            .unwrap();
        assert_eq!(result.path, "");
        assert_eq!(result.filename, "2024-01-01 Note.txt");
        assert_eq!(failed_attempts(&events), 0);
    }

    #[test]
    fn test_finish_keeps_long_names_within_limit() {
        let finished = finish(
            Categorization::new("A", "a".repeat(300)),
            Path::new("scan.jpg"),
        );
        assert_eq!(finished.filename.chars().count(), categorization::MAX_FILENAME_CHARS);
        assert!(finished.filename.ends_with(".jpg"));

        let finished = finish(Categorization::new("A", ". .hidden"), Path::new("scan.jpg"));
        assert_eq!(finished.filename, "hidden.jpg");
    }

    #[test]
    fn test_context_holds_every_shared_value() {
        let fixture = fixture();
        let categorizer = categorizer(&fixture, ScriptedCompletion::new(&[]), PipelineMode::Staged);
        let context = categorizer.build_context("some text").unwrap();

        assert_eq!(context.get(keys::OCR_TEXT), Some("some text"));
        // Filesystem order, so only membership is stable
        let top_level = context.get(keys::TOP_LEVEL_DIRECTORIES).unwrap();
        let names: Vec<String> = serde_json::from_str(top_level).unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Finance".to_string()));
        assert!(context.get(keys::EXAMPLE_FILENAMES).unwrap().contains("2023-11-02 Invoice Hoster.pdf"));
        assert!(context.get(keys::DIRECTORY_STRUCTURE).unwrap().contains("Invoices"));
        assert_eq!(context.get(keys::CURRENT_DATE).unwrap().len(), 10);
        assert!(!context.contains(keys::OCR_SUMMARY));
    }
}
