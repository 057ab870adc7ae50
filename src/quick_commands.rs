/// A `/token` shortcut that wraps the rest of the input in a fixed
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickCommand {
    pub token: &'static str,
    pub description: &'static str,
    preamble: &'static str,
}

impl QuickCommand {
    pub fn expand(&self, content: &str) -> String {
        format!("{}\n\n{}", self.preamble, content)
    }

    pub fn usage_hint(&self) -> String {
        format!(
            "Please provide content after the {0} command. For example: {0} your text here",
            self.token
        )
    }
}

pub const QUICK_COMMANDS: &[QuickCommand] = &[
    QuickCommand {
        token: "/summarize",
        description: "Get a concise summary of the following text.",
        preamble: "Please provide a concise summary of the following:",
    },
    QuickCommand {
        token: "/translate",
        description: "Translate text to English (or Spanish if English).",
        preamble: "Please translate the following text to English (or if it's already English, translate to Spanish):",
    },
    QuickCommand {
        token: "/explain",
        description: "Explain a topic in simple, easy-to-understand terms.",
        preamble: "Please explain the following in simple terms:",
    },
    QuickCommand {
        token: "/improve",
        description: "Improve and rewrite the provided text for clarity and style.",
        preamble: "Please improve and rewrite the following text:",
    },
    QuickCommand {
        token: "/code",
        description: "Review a piece of code and suggest improvements or best practices.",
        preamble: "Please review this code and suggest improvements:",
    },
    QuickCommand {
        token: "/fix",
        description: "Identify and fix any errors or bugs in the provided code.",
        preamble: "Please identify and fix any issues in this code:",
    },
    QuickCommand {
        token: "/ideas",
        description: "Brainstorm creative ideas related to a given topic.",
        preamble: "Please brainstorm creative ideas related to:",
    },
    QuickCommand {
        token: "/pros",
        description: "List the pros and cons for a given subject.",
        preamble: "Please list the pros and cons of:",
    },
];

/// Look up a command by token, ignoring ASCII case.
pub fn find_command(token: &str) -> Option<&'static QuickCommand> {
    QUICK_COMMANDS
        .iter()
        .find(|c| c.token.eq_ignore_ascii_case(token))
}
