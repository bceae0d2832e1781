// Shared fakes for integration tests
#![allow(dead_code, reason = "each test binary uses a subset of these helpers")]

use campaign_rag::embeddings::Embedder;
use campaign_rag::llm::{ChatMessage, ChatProvider};
use campaign_rag::{RagError, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const VOCABULARY: [&str; 10] = [
    "tavern", "ale", "blacksmith", "steel", "dragon", "cave", "gold", "forest", "mayor", "well",
];

/// Counts vocabulary words, so notes sharing words with a query rank first
pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-test"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        Ok(VOCABULARY
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32 + 0.001)
            .collect())
    }

    fn batch_size(&self) -> usize {
        4
    }
}

/// Replays canned replies in order and records every conversation it sees
pub struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
    conversations: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
            conversations: Mutex::new(Vec::new()),
        }
    }

    pub fn conversations(&self) -> Vec<Vec<ChatMessage>> {
        self.conversations.lock().expect("lock poisoned").clone()
    }
}

impl ChatProvider for ScriptedChat {
    fn model(&self) -> &str {
        "scripted-test"
    }

    fn chat(&self, messages: &[ChatMessage], _format: &serde_json::Value) -> Result<String> {
        self.conversations
            .lock()
            .expect("lock poisoned")
            .push(messages.to_vec());
        self.replies
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or_else(|| RagError::Generation("no scripted reply left".to_string()))
    }
}

pub const TOWN_NOTE: &str = "# Millbrook\n\
## Tavern\n\
The Drowned Rat serves warm ale to anyone with copper.\n\
## Blacksmith\n\
Old Hesta works steel from dawn to dusk.\n";

pub const WILDS_NOTE: &str = "# Wilds\n\
## Cave\n\
A young dragon sleeps on a bed of gold.\n\
```\n\
# not a header\n\
```\n";

/// Write notes under `<root>/<campaign>` and return that directory
pub fn write_campaign(root: &Path, campaign: &str, notes: &[(&str, &str)]) -> PathBuf {
    let dir = root.join(campaign);
    for (name, content) in notes {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("should create note dir");
        }
        fs::write(&path, content).expect("should write note");
    }
    fs::create_dir_all(&dir).expect("should create campaign dir");
    dir
}

pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}
