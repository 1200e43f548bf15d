// Integration test utilities and common code
#![allow(dead_code)]

pub mod fixtures;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mend::{Corrector, CorrectionError};
use tempfile::TempDir;

/// Test fixture helper for creating temporary input and output files
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with temporary directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();

        Self { temp_dir, root_path }
    }

    /// Create an input text file with given content
    pub fn create_input_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.root_path.join(relative_path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    pub fn output_path<P: AsRef<Path>>(&self, relative_path: P) -> PathBuf {
        self.root_path.join(relative_path)
    }

    pub fn read_output<P: AsRef<Path>>(&self, relative_path: P) -> String {
        fs::read_to_string(self.output_path(relative_path)).expect("Failed to read output file")
    }
}

/// Corrector answering from a closure that sees the text and its call number for that text
pub struct ScriptedCorrector<F> {
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    respond: F,
}

impl<F> ScriptedCorrector<F>
where
    F: Fn(&str, usize) -> Result<String, CorrectionError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            respond,
        }
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> Corrector for ScriptedCorrector<F>
where
    F: Fn(&str, usize) -> Result<String, CorrectionError> + Send + Sync,
{
    async fn correct(&self, text: &str) -> Result<String, CorrectionError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(text.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        (self.respond)(text, call)
    }
}

/// Ollama-style chat response body carrying `content`
pub fn chat_body(content: &str) -> String {
    serde_json::json!({
        "model": "test-model",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
    .to_string()
}

/// Text between the prompt's `Original:` and `Corrected:` markers
pub fn extract_chunk(prompt: &str) -> String {
    prompt
        .split_once("Original:\n")
        .and_then(|(_, rest)| rest.rsplit_once("\nCorrected:\n"))
        .map(|(chunk, _)| chunk.to_string())
        .unwrap_or_default()
}

/// Mocked `/api/chat` endpoint standing in for the correction service
pub struct MockService {
    server: mockito::ServerGuard,
    _mock: mockito::Mock,
    requests: Arc<AtomicUsize>,
}

impl MockService {
    pub fn url(&self) -> String {
        self.server.url()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Answer every chat request with `status` and a body built from the embedded chunk
pub async fn spawn_mock_service<F>(status: usize, respond: F) -> MockService
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    let mut server = mockito::Server::new_async().await;
    let requests = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&requests);
    let mock = server
        .mock("POST", "/api/chat")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body_from_request(move |request| {
            counter.fetch_add(1, Ordering::SeqCst);
            let body = request.body().map(|b| b.as_slice()).unwrap_or_default();
            let request: serde_json::Value = serde_json::from_slice(body).unwrap_or(serde_json::Value::Null);
            let prompt = request["messages"][0]["content"].as_str().unwrap_or_default();
            respond(&extract_chunk(prompt)).into_bytes()
        })
        .create_async()
        .await;

    MockService {
        server,
        _mock: mock,
        requests,
    }
}
