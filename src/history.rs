use crate::error::OverlayError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

pub const HISTORY_FILE: &str = "gemini_history.json";
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_tag: Option<String>,
    /// Assistant entries that carry an error message instead of a response.
    #[serde(default)]
    pub is_error: bool,
}

impl ConversationEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp(),
            mode_tag: None,
            is_error: false,
        }
    }

    pub fn assistant(text: impl Into<String>, mode_tag: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp(),
            mode_tag,
            is_error: false,
        }
    }

    pub fn error(err: &OverlayError) -> Self {
        Self {
            role: Role::Assistant,
            text: err.display_message(),
            timestamp: chrono::Utc::now().timestamp(),
            mode_tag: None,
            is_error: true,
        }
    }
}

/// Chronological transcript bounded to `cap` entries. The oldest entries are
/// dropped first.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    entries: VecDeque<ConversationEntry>,
    cap: usize,
}

impl ConversationContext {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(DEFAULT_HISTORY_LIMIT)),
            cap,
        }
    }

    /// Build a context from stored entries, keeping only the newest `cap`.
    pub fn from_entries(entries: impl IntoIterator<Item = ConversationEntry>, cap: usize) -> Self {
        let mut ctx = Self::new(cap);
        for e in entries {
            ctx.append(e);
        }
        ctx
    }

    /// Load from `store`, falling back to an empty context when the stored
    /// history is missing or unreadable.
    pub fn load(store: &dyn HistoryStore, cap: usize) -> Self {
        match store.load() {
            Ok(list) => Self::from_entries(list, cap),
            Err(e) => {
                tracing::error!("failed to load history: {e}");
                Self::new(cap)
            }
        }
    }

    pub fn persist(&self, store: &dyn HistoryStore) -> Result<(), OverlayError> {
        let list: Vec<ConversationEntry> = self.entries.iter().cloned().collect();
        store.save(&list)
    }

    pub fn append(&mut self, entry: ConversationEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.back()
    }

    /// Most recent assistant text that is not an error message.
    pub fn last_response(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.role == Role::Assistant && !e.is_error)
            .map(|e| e.text.as_str())
    }

    /// Prior turns as `User:`/`Assistant:` lines followed by the new query.
    /// Error entries are left out so failed calls are not replayed to the
    /// model.
    pub fn build_prompt(&self, query: &str) -> String {
        let mut out = String::new();
        for e in self.entries.iter().filter(|e| !e.is_error) {
            let who = match e.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            out.push_str(who);
            out.push_str(": ");
            out.push_str(&e.text);
            out.push('\n');
        }
        out.push_str("User: ");
        out.push_str(query);
        out
    }
}

/// Persistent backing for [`ConversationContext`].
pub trait HistoryStore: Send {
    fn load(&self) -> Result<Vec<ConversationEntry>, OverlayError>;
    fn save(&self, entries: &[ConversationEntry]) -> Result<(), OverlayError>;
}

/// Stores the transcript as pretty-printed JSON.
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_internal(&self) -> anyhow::Result<Vec<ConversationEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let list = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(list)
    }

    fn save_internal(&self, entries: &[ConversationEntry]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load(&self) -> Result<Vec<ConversationEntry>, OverlayError> {
        self.load_internal()
            .map_err(|e| OverlayError::Storage(format!("{e:#}")))
    }

    fn save(&self, entries: &[ConversationEntry]) -> Result<(), OverlayError> {
        self.save_internal(entries)
            .map_err(|e| OverlayError::Storage(format!("{e:#}")))
    }
}
