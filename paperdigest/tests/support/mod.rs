#![allow(dead_code)]

use paperdigest::error::ApiError;
use paperdigest::llm::LlmProvider;
use paperdigest::progress::ProgressSink;
use paperdigest::prompts::SummaryPrompts;
use paperdigest::template::PromptTemplate;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Prompts whose rendered text is easy to take apart again: `KIND|title|text`
pub fn test_prompts() -> SummaryPrompts {
    SummaryPrompts {
        stuff: PromptTemplate::new("STUFF|{title}|{text}"),
        map: PromptTemplate::new("MAP|{title}|{text}"),
        reduce: PromptTemplate::new("REDUCE|{title}|{text}"),
    }
}

/// LLM double. Map prompts answer `mapResult{text}` after an optional per-text
/// delay, or fail when the text is listed in `failures`.
#[derive(Default)]
pub struct ScriptedProvider {
    pub prompts: Mutex<Vec<String>>,
    /// Chunk texts whose map request finished, in completion order
    pub completed: Mutex<Vec<String>>,
    delays: HashMap<String, Duration>,
    failures: HashSet<String>,
    reply: Option<String>,
    stuff_reply: Option<String>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failures.insert(text.to_string());
        self
    }

    /// Replace the stuff answer, e.g. with an empty one
    pub fn with_stuff_reply(mut self, reply: &str) -> Self {
        self.stuff_reply = Some(reply.to_string());
        self
    }

    /// Fixed reply for prompts that are not stuff/map/reduce
    pub fn replying(mut self, reply: &str) -> Self {
        self.reply = Some(reply.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        let prefix = format!("{}|", kind);
        self.prompts().iter().filter(|p| p.starts_with(&prefix)).count()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut parts = prompt.splitn(3, '|');
        let kind = parts.next().unwrap_or_default();
        let _title = parts.next();
        let text = parts.next().unwrap_or_default().to_string();

        match kind {
            "STUFF" => Ok(self
                .stuff_reply
                .clone()
                .unwrap_or_else(|| "stuffResult".to_string())),
            "REDUCE" => Ok("reduceResult".to_string()),
            "MAP" => {
                if let Some(delay) = self.delays.get(&text) {
                    tokio::time::sleep(*delay).await;
                }
                if self.failures.contains(&text) {
                    return Err(ApiError::Status {
                        endpoint: "http://llm.test/v1".to_string(),
                        status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                        message: Some(format!("chunk {} exploded", text)),
                    });
                }
                self.completed.lock().unwrap().push(text.clone());
                Ok(format!("mapResult{}", text))
            }
            _ => Ok(self.reply.clone().unwrap_or_else(|| "answer".to_string())),
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

/// Progress sink that remembers everything
#[derive(Default)]
pub struct RecordingProgress {
    pub reports: Mutex<Vec<(u8, String)>>,
    pub failures: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn percents(&self) -> Vec<u8> {
        self.reports.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.reports.lock().unwrap().last().map(|(_, t)| t.clone())
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, percent: u8, text: &str) {
        self.reports.lock().unwrap().push((percent, text.to_string()));
    }

    fn fail(&self, text: &str) {
        self.failures.lock().unwrap().push(text.to_string());
    }
}
