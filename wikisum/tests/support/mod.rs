#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use wikisum::fetch::{ContentFetcher, FetchError};
use wikisum::llm::{LlmError, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};
use wikisum::reference::NormalizedReference;

/// Fresh in-memory database with the real migrations applied.
pub async fn memory_pool() -> SqlitePool {
    // one connection: every new in-memory connection would be a separate database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test pool");
    common::run_migrations(&pool).await.expect("migrations");
    pool
}

/// Serves the same article text for every reference and counts calls.
pub struct FakeFetcher {
    text: Result<String, String>,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn serving(text: impl Into<String>) -> Self {
        Self {
            text: Ok(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            text: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, _reference: &NormalizedReference) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone().map_err(FetchError::Http)
    }
}

/// Model that answers from a script, then repeats a default reply (or fails).
pub struct FakeModel {
    name: String,
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    default_reply: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeModel {
    pub fn replying(name: &str, reply: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            default_reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn down(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            default_reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn scripted(name: &str, script: Vec<Result<String, LlmError>>, then: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            default_reply: Some(then.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmProvider for FakeModel {
    async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        let content = match scripted {
            Some(result) => result?,
            None => self
                .default_reply
                .clone()
                .ok_or_else(|| LlmError::Transport("connection refused".to_string()))?,
        };
        Ok(LlmResponse {
            content,
            usage: UsageMetadata::default(),
            model: self.name.clone(),
        })
    }

    fn model(&self) -> &str {
        &self.name
    }
}

/// `sentences * 10` words of plain English prose, five sentences per paragraph.
pub fn english_article(sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("The test subject number {i} was described in detail here."))
        .collect::<Vec<_>>()
        .chunks(5)
        .map(|para| para.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n")
}
