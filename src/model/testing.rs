//! Scripted model for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{GenerateRequest, GenerateResponse, GenerativeModel, ModelError};

/// Replays queued answers in order and records every request it saw.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    answers: Mutex<VecDeque<Result<GenerateResponse, ModelError>>>,
    seen: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn then_output(self, output: Value) -> Self {
        self.then(Ok(GenerateResponse {
            text: Some(output.to_string()),
            output: Some(output),
            media: None,
        }))
    }

    pub(crate) fn then_media(self, media: Option<&str>) -> Self {
        self.then(Ok(GenerateResponse {
            text: Some("here you go".to_string()),
            output: None,
            media: media.map(str::to_owned),
        }))
    }

    pub(crate) fn then_error(self, err: ModelError) -> Self {
        self.then(Err(err))
    }

    pub(crate) fn then(self, answer: Result<GenerateResponse, ModelError>) -> Self {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(answer);
        }
        self
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ModelError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request);
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or_else(|| Err(ModelError::Transport("no scripted answer left".to_string())))
    }
}
