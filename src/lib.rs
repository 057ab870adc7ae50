pub mod client;
pub mod clipboard;
pub mod credential;
pub mod error;
pub mod fade;
pub mod gui;
pub mod history;
pub mod hotkey;
pub mod logging;
pub mod modes;
pub mod prompt;
pub mod quick_commands;
pub mod session;
pub mod settings;
pub mod visibility;

pub use error::OverlayError;
