/// Window lifecycle. `Showing` and `Hiding` last for the duration of a fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Showing,
    Visible,
    Hiding,
}

impl Visibility {
    /// Whether the window is on screen at all.
    pub fn is_shown(self) -> bool {
        !matches!(self, Visibility::Hidden)
    }

    /// Transition a toggle request starts. `None` while a fade is running:
    /// toggles are dropped rather than queued.
    pub fn toggle_target(self) -> Option<Visibility> {
        match self {
            Visibility::Hidden => Some(Visibility::Showing),
            Visibility::Visible => Some(Visibility::Hiding),
            Visibility::Showing | Visibility::Hiding => None,
        }
    }

    /// State reached once the running fade completes.
    pub fn settle(self) -> Visibility {
        match self {
            Visibility::Showing => Visibility::Visible,
            Visibility::Hiding => Visibility::Hidden,
            other => other,
        }
    }
}

/// Side effects the session asks the window layer to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCommand {
    /// Map the window (at zero opacity) so the fade-in can run.
    Show,
    /// Give keyboard focus to the input field.
    Focus,
    /// Park the window once it has faded out.
    Hide,
}
