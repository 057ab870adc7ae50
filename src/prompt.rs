use crate::history::ConversationContext;
use crate::modes::Mode;
use crate::quick_commands::find_command;

/// User-pinned snippets injected into every ordinary prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinnedContext {
    items: Vec<String>,
}

impl PinnedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `text`. Blank text is ignored; returns whether anything was added.
    pub fn pin(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.items.push(text.to_string());
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposedPrompt {
    /// Text to send to the model.
    Forward(String),
    /// A quick command was used without content; show this instead of
    /// calling the model.
    UsageHint(String),
}

impl ComposedPrompt {
    pub fn text(&self) -> &str {
        match self {
            ComposedPrompt::Forward(s) | ComposedPrompt::UsageHint(s) => s,
        }
    }
}

/// Turn raw input into the prompt sent to the model.
///
/// Quick commands replace the mode instruction and pinned context entirely.
/// Any other input starting with `/` is forwarded untouched. `history` is only
/// passed when multi-turn prompting is enabled.
pub fn compose(
    raw: &str,
    mode: Mode,
    pinned: &[String],
    history: Option<&ConversationContext>,
) -> ComposedPrompt {
    let query = raw.trim();
    if query.starts_with('/') {
        let token = query.split_whitespace().next().unwrap_or(query);
        return match find_command(token) {
            Some(cmd) => {
                let content = query[token.len()..].trim();
                if content.is_empty() {
                    ComposedPrompt::UsageHint(cmd.usage_hint())
                } else {
                    ComposedPrompt::Forward(cmd.expand(content))
                }
            }
            None => ComposedPrompt::Forward(raw.to_string()),
        };
    }

    let mut out = format!("System: {}", mode.instruction());
    if !pinned.is_empty() {
        out.push_str("\n\nPinned Context:\n");
        for item in pinned {
            out.push_str("- ");
            out.push_str(item);
            out.push('\n');
        }
    }
    out.push_str("\n\n");
    match history.filter(|h| !h.is_empty()) {
        Some(h) => out.push_str(&h.build_prompt(query)),
        None => {
            out.push_str("User: ");
            out.push_str(query);
        }
    }
    ComposedPrompt::Forward(out)
}
