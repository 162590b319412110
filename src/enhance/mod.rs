//! Remote enhancement service boundary.
//!
//! The reconciliation engine only ever talks to the remote transcription
//! service through [`EnhancementService`], so tests swap in a scripted mock
//! and the HTTP client stays behind the `remote` feature.

pub mod pipeline;
#[cfg(feature = "remote")]
pub mod remote;

use crate::error::{ProtoscribeError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Trait for the slower, higher-confidence transcription service.
///
/// Any non-success outcome (network error, non-2xx, timeout) is reported as
/// an `Err` and treated uniformly as a pipeline failure for retry purposes.
#[async_trait]
pub trait EnhancementService: Send + Sync {
    /// Transcribe an audio payload into authoritative text.
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Service name for logging and diagnostics.
    fn name(&self) -> &str;
}

/// Implement EnhancementService for Arc<T> to allow sharing across tasks.
#[async_trait]
impl<T: EnhancementService + ?Sized> EnhancementService for std::sync::Arc<T> {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        (**self).transcribe(audio).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// One scripted reply of the mock service.
#[derive(Debug, Clone)]
enum ScriptedCall {
    Respond(String),
    Fail(String),
}

/// Mock enhancement service for testing.
///
/// Scripted calls are consumed in dispatch order; once the script is
/// exhausted the fallback applies to every further call.
pub struct MockEnhancementService {
    script: Mutex<VecDeque<ScriptedCall>>,
    fallback: ScriptedCall,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl MockEnhancementService {
    /// Create a mock that answers every call with a canned response.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: ScriptedCall::Respond("mock enhancement".to_string()),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Configure the fallback response for unscripted calls.
    pub fn with_response(mut self, response: &str) -> Self {
        self.fallback = ScriptedCall::Respond(response.to_string());
        self
    }

    /// Configure the mock to fail every unscripted call.
    pub fn with_failure(mut self) -> Self {
        self.fallback = ScriptedCall::Fail("mock enhancement failure".to_string());
        self
    }

    /// Simulate network latency on every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Script `count` failures before the fallback takes over.
    pub fn then_fail(self, count: u32) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            for _ in 0..count {
                script.push_back(ScriptedCall::Fail("scripted failure".to_string()));
            }
        }
        self
    }

    /// Script one successful response.
    pub fn then_respond(self, response: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedCall::Respond(response.to_string()));
        self
    }

    /// Number of transcription calls received so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockEnhancementService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnhancementService for MockEnhancementService {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let call = {
            let mut script = self.script.lock().unwrap();
            script.pop_front().unwrap_or_else(|| self.fallback.clone())
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match call {
            ScriptedCall::Respond(text) => Ok(text),
            ScriptedCall::Fail(message) => Err(ProtoscribeError::Enhancement { message }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
