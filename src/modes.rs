use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation presets. Each one prepends a fixed system instruction to
/// ordinary (non-command) prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Normal,
    Informal,
    Professional,
    Creative,
    Teacher,
    Coder,
    Concise,
    Analyzer,
    Brainstormer,
}

impl Mode {
    pub const ALL: [Mode; 9] = [
        Mode::Normal,
        Mode::Informal,
        Mode::Professional,
        Mode::Creative,
        Mode::Teacher,
        Mode::Coder,
        Mode::Concise,
        Mode::Analyzer,
        Mode::Brainstormer,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Mode::Normal => "🤖 Normal",
            Mode::Informal => "😎 Informal",
            Mode::Professional => "👔 Professional",
            Mode::Creative => "🎨 Creative",
            Mode::Teacher => "📚 Teacher",
            Mode::Coder => "💻 Coder",
            Mode::Concise => "⚡ Concise",
            Mode::Analyzer => "🔍 Analyzer",
            Mode::Brainstormer => "💡 Brainstormer",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Mode::Normal => {
                "You are a helpful AI assistant. Provide clear, accurate, and helpful responses."
            }
            Mode::Informal => {
                "You are a casual, friendly AI assistant. Use informal language, contractions, and speak like you're chatting with a friend. Be relaxed and conversational."
            }
            Mode::Professional => {
                "You are a professional AI assistant. Use formal language, proper grammar, and maintain a business-appropriate tone. Be thorough and precise in your responses."
            }
            Mode::Creative => {
                "You are a creative AI assistant. Be imaginative, think outside the box, and provide creative solutions. Use vivid language and interesting analogies."
            }
            Mode::Teacher => {
                "You are an educational AI tutor. Break down complex topics into easy-to-understand explanations. Use examples, analogies, and step-by-step guidance."
            }
            Mode::Coder => {
                "You are a programming expert. Focus on code quality, best practices, and clear technical explanations. Provide working code examples and explain your reasoning."
            }
            Mode::Concise => {
                "You are a concise AI assistant. Give brief, to-the-point answers. Avoid lengthy explanations unless specifically requested. Be direct and efficient."
            }
            Mode::Analyzer => {
                "You are an analytical AI assistant. Approach problems systematically, break them down into components, and provide detailed analysis with pros/cons."
            }
            Mode::Brainstormer => {
                "You are a brainstorming partner. Generate multiple ideas, think creatively, and help explore different possibilities. Encourage innovative thinking."
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
