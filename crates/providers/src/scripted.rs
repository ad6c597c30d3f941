//! A deterministic provider that replays canned completions.
//!
//! Used by tests and offline demos in place of a network backend. Each call
//! returns the next completion in order; streaming splits it into word-sized
//! deltas so observers see realistic incremental output.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stepwise_core::error::ProviderError;
use stepwise_core::message::ChatMessage;
use stepwise_core::provider::*;
use tokio::sync::mpsc;
use tracing::debug;

pub struct ScriptedProvider {
    responses: Vec<String>,
    cycle: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    /// Replay `responses` once each, then fail with [`ProviderError::Exhausted`].
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            cycle: false,
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same completion.
    pub fn repeating(response: impl Into<String>) -> Self {
        Self::new([response.into()]).cycling()
    }

    /// Start over from the first completion once the script runs out.
    pub fn cycling(mut self) -> Self {
        self.cycle = true;
        self
    }

    /// Wait before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completions requested so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    async fn next_response(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let index = if self.cycle && !self.responses.is_empty() {
            call % self.responses.len()
        } else {
            call
        };
        let response = self
            .responses
            .get(index)
            .cloned()
            .ok_or(ProviderError::Exhausted(call + 1))?;
        debug!(call = call + 1, chars = response.len(), "Scripted completion");
        Ok(response)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let text = self.next_response(request).await?;
        Ok(ProviderResponse {
            message: ChatMessage::assistant(text),
            usage: None,
            model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let text = self.next_response(request).await?;
        let deltas: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();

        let (tx, rx) = mpsc::channel(deltas.len() + 1);
        tokio::spawn(async move {
            for delta in deltas {
                let chunk = StreamChunk {
                    content: Some(delta),
                    ..StreamChunk::default()
                };
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(Ok(StreamChunk {
                    done: true,
                    ..StreamChunk::default()
                }))
                .await;
        });
        Ok(rx)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
