use async_trait::async_trait;
use clonar::error::{ClonarError, Result};
use clonar::providers::{CompletionOptions, CompletionResponse, Message, Provider};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// Provider that replays scripted replies in order; `None` fails the call
#[allow(dead_code)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Option<String>>>,
    pub calls: Mutex<Vec<Vec<Message>>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(replies: Vec<Option<&str>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front().flatten();
        match next {
            Some(reply) => Ok(CompletionResponse::new(Message::assistant(reply))),
            None => Err(ClonarError::Provider("scripted failure".to_string()).into()),
        }
    }
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
