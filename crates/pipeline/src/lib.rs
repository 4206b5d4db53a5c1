//! The document processing pipeline.
//!
//! [`DocumentPipeline`] ties the pieces together for one run: resolve the
//! chunk budget from the server's context window, chunk the document once,
//! then for every chunk in order assemble a prompt and drain a streamed
//! generation into a complete result. Chunks are processed strictly in
//! document order — translation and summary coherence depend on stable
//! ordering, so there is no cross-chunk parallelism.

use std::sync::Arc;
use textmill_chunker::chunk_text;
use textmill_core::client::{GenerateRequest, ModelClient, SamplingParams};
use textmill_core::document::{Document, RunMetadata};
use textmill_core::error::{Error, GenerationError};
use textmill_core::task::{TaskConfig, TaskId};
use textmill_core::template::PromptTemplate;
use tracing::{debug, info};

/// The fixed system message wrapped around every chunk.
const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant.";

/// Receives text fragments as they arrive, purely for operator visibility.
///
/// A sink never affects the returned value; it exists so a CLI can echo
/// generation progress live.
pub trait ProgressSink: Send + Sync {
    fn fragment(&self, text: &str);
}

/// The per-run pipeline: budget resolution, chunking, and the ordered
/// generate loop.
pub struct DocumentPipeline {
    /// The generation server.
    client: Arc<dyn ModelClient>,

    /// The prompt renderer.
    template: Arc<dyn PromptTemplate>,

    /// Target language for the translate task.
    language: String,

    /// Sampling parameters passed through to every request.
    params: SamplingParams,

    /// Raw text-completion mode flag, passed through opaquely.
    text_completion: bool,

    /// Optional live progress observer.
    sink: Option<Arc<dyn ProgressSink>>,
}

impl DocumentPipeline {
    /// Create a new pipeline over a model client and a prompt template.
    pub fn new(client: Arc<dyn ModelClient>, template: Arc<dyn PromptTemplate>) -> Self {
        Self {
            client,
            template,
            language: "English".into(),
            params: SamplingParams::default(),
            text_completion: false,
            sink: None,
        }
    }

    /// Set the target language for the translate task.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the sampling parameters forwarded to the server.
    pub fn with_sampling(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    /// Enable raw text-completion mode.
    pub fn with_text_completion(mut self, enabled: bool) -> Self {
        self.text_completion = enabled;
        self
    }

    /// Attach a live progress sink.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Process a document for the given task.
    ///
    /// Returns one completed text per chunk, in chunk order, plus the merged
    /// run metadata. Any per-chunk failure aborts the whole run; no partial
    /// result sequence is ever returned.
    pub async fn process(
        &self,
        task: TaskId,
        document: &Document,
    ) -> Result<(Vec<String>, RunMetadata), Error> {
        let max_context = self.client.max_context_length().await?;
        let task_config = TaskConfig::resolve(task, max_context, &self.language)?;

        info!(
            task = %task,
            source = %document.source,
            budget = task_config.budget,
            max_context,
            "Starting document run"
        );

        let (chunks, stats) = chunk_text(&document.content, task_config.budget);
        let mut metadata = stats.to_metadata();

        // Generation gets half the context window; the other half is the
        // prompt's share.
        let max_length = (max_context / 2) as u32;

        let mut results = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            debug!(
                chunk = chunk.index,
                size = chunk.size,
                oversized = chunk.oversized,
                "Processing chunk"
            );

            let result = self
                .run_chunk(&task_config, &chunk.text, max_length)
                .await
                .map_err(|e| e.for_chunk(task.to_string(), chunk.index))?;
            results.push(result);
        }

        let mut annotations = RunMetadata::new();
        annotations.insert("Task", task.to_string());
        annotations.insert("Source", document.source.clone());
        annotations.insert("Processing-Time", chrono::Utc::now().to_rfc3339());
        metadata.merge(annotations);

        info!(task = %task, chunks = results.len(), "Document run complete");
        Ok((results, metadata))
    }

    /// Assemble the prompt for one chunk and stream its completion.
    async fn run_chunk(
        &self,
        task_config: &TaskConfig,
        content: &str,
        max_length: u32,
    ) -> Result<String, Error> {
        let wrapped =
            self.template
                .wrap(&task_config.instruction, content, SYSTEM_INSTRUCTION)?;
        let prompt = wrapped
            .into_iter()
            .next()
            .ok_or(textmill_core::error::TemplateError::EmptyRender)?;

        self.generate(prompt, max_length).await
    }

    /// Issue one streaming request and drain it into a complete result.
    ///
    /// Fragments are concatenated in arrival order. The accumulated text
    /// must be non-empty after trimming — an empty completion is a
    /// [`GenerationError`], not a transport failure.
    async fn generate(&self, prompt: String, max_length: u32) -> Result<String, Error> {
        let request = GenerateRequest {
            prompt,
            max_length,
            params: self.params.clone(),
            text_completion: self.text_completion,
        };

        let mut fragments = self.client.stream_generate(request).await?;
        let mut generated = String::new();

        while let Some(fragment) = fragments.recv().await {
            let text = fragment?;
            if let Some(sink) = &self.sink {
                sink.fragment(&text);
            }
            generated.push_str(&text);
        }

        if generated.trim().is_empty() {
            return Err(GenerationError::Empty.into());
        }

        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use textmill_core::error::{ConfigError, StreamError, TemplateError};
    use textmill_core::client::FragmentStream;

    /// A mock client that replays scripted fragment streams and records
    /// the prompts it was called with, in order.
    struct MockClient {
        max_context: i64,
        scripts: Mutex<VecDeque<Vec<Result<String, StreamError>>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockClient {
        fn new(max_context: i64, scripts: Vec<Vec<Result<String, StreamError>>>) -> Self {
            Self {
                max_context,
                scripts: Mutex::new(scripts.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ModelClient for MockClient {
        fn name(&self) -> &str {
            "mock"
        }

        async fn max_context_length(&self) -> Result<i64, StreamError> {
            Ok(self.max_context)
        }

        async fn stream_generate(
            &self,
            request: GenerateRequest,
        ) -> Result<FragmentStream, StreamError> {
            self.prompts.lock().unwrap().push(request.prompt);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .expect("mock client called more times than scripted");

            let (tx, rx) = tokio::sync::mpsc::channel(16);
            tokio::spawn(async move {
                for fragment in script {
                    if tx.send(fragment).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    /// A template that brackets its fields so tests can see them.
    struct MockTemplate;

    impl PromptTemplate for MockTemplate {
        fn name(&self) -> &str {
            "mock"
        }

        fn wrap(
            &self,
            instruction: &str,
            content: &str,
            _system_instruction: &str,
        ) -> Result<Vec<String>, TemplateError> {
            Ok(vec![format!("[{instruction}] {content}")])
        }
    }

    /// A template that always fails to render.
    struct BrokenTemplate;

    impl PromptTemplate for BrokenTemplate {
        fn name(&self) -> &str {
            "broken"
        }

        fn wrap(&self, _: &str, _: &str, _: &str) -> Result<Vec<String>, TemplateError> {
            Err(TemplateError::NotFound("missing.txt".into()))
        }
    }

    fn ok(fragments: &[&str]) -> Vec<Result<String, StreamError>> {
        fragments.iter().map(|f| Ok(f.to_string())).collect()
    }

    #[tokio::test]
    async fn fragments_concatenate_in_arrival_order() {
        let client = Arc::new(MockClient::new(
            8192,
            vec![ok(&["Hel", "lo", " world", "."])],
        ));
        let pipeline = DocumentPipeline::new(client, Arc::new(MockTemplate));

        let doc = Document::new("A single short paragraph.", "test.txt");
        let (results, _) = pipeline.process(TaskId::Summary, &doc).await.unwrap();

        assert_eq!(results, vec!["Hello world."]);
    }

    #[tokio::test]
    async fn three_paragraphs_three_ordered_calls() {
        // Budget forces one chunk per paragraph: summary fraction 0.8 of 25
        // gives a budget of 20 chars; each 17-char paragraph fits alone but
        // no two fit together.
        let client = Arc::new(MockClient::new(
            25,
            vec![ok(&["first result"]), ok(&["second result"]), ok(&["third result"])],
        ));
        let pipeline = DocumentPipeline::new(client.clone(), Arc::new(MockTemplate));

        let doc = Document::new(
            "alpha paragraph A\n\nbeta paragraph BB\n\ngamma paragraph C",
            "test.txt",
        );
        let (results, metadata) = pipeline.process(TaskId::Summary, &doc).await.unwrap();

        assert_eq!(results, vec!["first result", "second result", "third result"]);

        // Generation calls happened in chunk order
        let prompts = client.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("alpha paragraph A"));
        assert!(prompts[1].contains("beta paragraph BB"));
        assert!(prompts[2].contains("gamma paragraph C"));

        assert_eq!(metadata.get("Chunk-Count").unwrap(), 3);
        assert_eq!(metadata.get("Task").unwrap().as_str(), Some("summary"));
    }

    #[tokio::test]
    async fn empty_document_makes_no_generation_calls() {
        let client = Arc::new(MockClient::new(8192, vec![]));
        let pipeline = DocumentPipeline::new(client.clone(), Arc::new(MockTemplate));

        let doc = Document::new("", "empty.txt");
        let (results, metadata) = pipeline.process(TaskId::Distill, &doc).await.unwrap();

        assert!(results.is_empty());
        assert!(client.prompts().is_empty());
        assert_eq!(metadata.get("Paragraph-Count").unwrap(), 0);
        assert_eq!(metadata.get("Chunk-Count").unwrap(), 0);
    }

    #[tokio::test]
    async fn whitespace_only_output_is_a_generation_error() {
        let client = Arc::new(MockClient::new(8192, vec![ok(&["  ", "\n", "\t"])]));
        let pipeline = DocumentPipeline::new(client, Arc::new(MockTemplate));

        let doc = Document::new("Some paragraph.", "test.txt");
        let err = pipeline.process(TaskId::Correct, &doc).await.unwrap_err();

        match err {
            Error::ChunkFailed {
                task,
                chunk_index,
                source,
            } => {
                assert_eq!(task, "correct");
                assert_eq!(chunk_index, 0);
                assert!(matches!(*source, Error::Generation(GenerationError::Empty)));
            }
            other => panic!("expected ChunkFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_error_aborts_the_run() {
        let client = Arc::new(MockClient::new(
            8192,
            vec![vec![
                Ok("partial".into()),
                Err(StreamError::Interrupted("connection reset".into())),
            ]],
        ));
        let pipeline = DocumentPipeline::new(client, Arc::new(MockTemplate));

        let doc = Document::new("Some paragraph.", "test.txt");
        let err = pipeline.process(TaskId::Summary, &doc).await.unwrap_err();

        match err {
            Error::ChunkFailed { source, .. } => {
                assert!(matches!(*source, Error::Stream(StreamError::Interrupted(_))));
            }
            other => panic!("expected ChunkFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn template_failure_aborts_the_run() {
        let client = Arc::new(MockClient::new(8192, vec![]));
        let pipeline = DocumentPipeline::new(client.clone(), Arc::new(BrokenTemplate));

        let doc = Document::new("Some paragraph.", "test.txt");
        let err = pipeline.process(TaskId::Summary, &doc).await.unwrap_err();

        match err {
            Error::ChunkFailed { chunk_index, source, .. } => {
                assert_eq!(chunk_index, 0);
                assert!(matches!(*source, Error::Template(_)));
            }
            other => panic!("expected ChunkFailed, got {other:?}"),
        }
        // Template failed before any network activity
        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn invalid_context_length_fails_before_generation() {
        let client = Arc::new(MockClient::new(0, vec![]));
        let pipeline = DocumentPipeline::new(client.clone(), Arc::new(MockTemplate));

        let doc = Document::new("Some paragraph.", "test.txt");
        let err = pipeline.process(TaskId::Summary, &doc).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidContextLength(0))
        ));
        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn progress_sink_sees_every_fragment() {
        struct RecordingSink(Mutex<String>);
        impl ProgressSink for RecordingSink {
            fn fragment(&self, text: &str) {
                self.0.lock().unwrap().push_str(text);
            }
        }

        let sink = Arc::new(RecordingSink(Mutex::new(String::new())));
        let client = Arc::new(MockClient::new(8192, vec![ok(&["one ", "two ", "three"])]));
        let pipeline = DocumentPipeline::new(client, Arc::new(MockTemplate))
            .with_progress(sink.clone());

        let doc = Document::new("Some paragraph.", "test.txt");
        let (results, _) = pipeline.process(TaskId::Distill, &doc).await.unwrap();

        // The sink observed exactly what the result accumulated
        assert_eq!(*sink.0.lock().unwrap(), results[0]);
    }

    #[tokio::test]
    async fn translate_instruction_carries_configured_language() {
        let client = Arc::new(MockClient::new(8192, vec![ok(&["translated"])]));
        let pipeline = DocumentPipeline::new(client.clone(), Arc::new(MockTemplate))
            .with_language("Italian");

        let doc = Document::new("Some paragraph.", "test.txt");
        pipeline.process(TaskId::Translate, &doc).await.unwrap();

        assert!(client.prompts()[0].contains("Italian"));
    }

    #[tokio::test]
    async fn metadata_records_run_annotations() {
        let client = Arc::new(MockClient::new(8192, vec![ok(&["out"])]));
        let pipeline = DocumentPipeline::new(client, Arc::new(MockTemplate));

        let doc = Document::new("Some paragraph.", "notes/input.txt");
        let (_, metadata) = pipeline.process(TaskId::Summary, &doc).await.unwrap();

        assert_eq!(metadata.get("Task").unwrap().as_str(), Some("summary"));
        assert_eq!(
            metadata.get("Source").unwrap().as_str(),
            Some("notes/input.txt")
        );
        assert!(metadata.get("Processing-Time").is_some());
        assert_eq!(metadata.get("Chunk-Budget").unwrap(), 6553);
    }
}
