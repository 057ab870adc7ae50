use crate::error::OverlayError;
use std::collections::HashSet;
use std::fmt;
use std::thread::JoinHandle;

/// Logical key as seen by the chord detector. Left and right variants of a
/// modifier collapse into one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Control,
    Shift,
    Alt,
    Meta,
    Space,
    Tab,
    Return,
    Escape,
    Delete,
    Backspace,
    CapsLock,
    Home,
    End,
    PageUp,
    PageDown,
    LeftArrow,
    RightArrow,
    UpArrow,
    DownArrow,
    F(u8),
    /// Uppercase ASCII letter or digit.
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Press(Key),
    Release(Key),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub win: bool,
}

impl Default for Hotkey {
    fn default() -> Self {
        Self {
            key: Key::Space,
            ctrl: true,
            shift: false,
            alt: false,
            win: false,
        }
    }
}

impl Hotkey {
    /// Keys that must all be held for the chord to be active.
    pub fn required_keys(&self) -> Vec<Key> {
        let mut keys = Vec::with_capacity(5);
        if self.ctrl {
            keys.push(Key::Control);
        }
        if self.shift {
            keys.push(Key::Shift);
        }
        if self.alt {
            keys.push(Key::Alt);
        }
        if self.win {
            keys.push(Key::Meta);
        }
        keys.push(self.key);
        keys
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        if self.win {
            write!(f, "Win+")?;
        }
        match self.key {
            Key::F(n) => write!(f, "F{n}"),
            Key::Char(c) => write!(f, "{c}"),
            Key::Return => write!(f, "Enter"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Parse a hotkey string like "Ctrl+Shift+Space" into a [`Hotkey`].
pub fn parse_hotkey(s: &str) -> Option<Hotkey> {
    let mut ctrl = false;
    let mut shift = false;
    let mut alt = false;
    let mut win = false;
    let mut key: Option<Key> = None;

    for part in s.split('+') {
        let upper = part.trim().to_ascii_uppercase();
        match upper.as_str() {
            "CTRL" | "CONTROL" => ctrl = true,
            "SHIFT" => shift = true,
            "ALT" => alt = true,
            "WIN" | "META" | "CMD" | "SUPER" => win = true,
            "" => {}
            _ => {
                if key.is_some() {
                    return None;
                }
                key = Some(parse_key(&upper)?);
            }
        }
    }

    key.map(|k| Hotkey {
        key: k,
        ctrl,
        shift,
        alt,
        win,
    })
}

fn parse_key(upper: &str) -> Option<Key> {
    match upper {
        "SPACE" => Some(Key::Space),
        "TAB" => Some(Key::Tab),
        "ENTER" | "RETURN" => Some(Key::Return),
        "ESC" | "ESCAPE" => Some(Key::Escape),
        "DELETE" => Some(Key::Delete),
        "BACKSPACE" => Some(Key::Backspace),
        "CAPSLOCK" => Some(Key::CapsLock),
        "HOME" => Some(Key::Home),
        "END" => Some(Key::End),
        "PAGEUP" => Some(Key::PageUp),
        "PAGEDOWN" => Some(Key::PageDown),
        "LEFT" | "LEFTARROW" => Some(Key::LeftArrow),
        "RIGHT" | "RIGHTARROW" => Some(Key::RightArrow),
        "UP" | "UPARROW" => Some(Key::UpArrow),
        "DOWN" | "DOWNARROW" => Some(Key::DownArrow),
        _ if upper.len() > 1 && upper.starts_with('F') => match upper[1..].parse::<u8>() {
            Ok(n @ 1..=12) => Some(Key::F(n)),
            _ => None,
        },
        _ => {
            let mut chars = upper.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => Some(Key::Char(c)),
                _ => None,
            }
        }
    }
}

/// Tracks which chord members are held and reports rising edges.
///
/// The detector fires once when the last required key goes down and stays
/// quiet until at least one member is released again, so OS auto-repeat does
/// not toggle the overlay repeatedly.
pub struct ChordDetector {
    required: Vec<Key>,
    held: HashSet<Key>,
    triggered: bool,
    on_activated: Option<Box<dyn FnMut() + Send>>,
}

impl ChordDetector {
    pub fn new(hotkey: Hotkey) -> Self {
        Self {
            required: hotkey.required_keys(),
            held: HashSet::new(),
            triggered: false,
            on_activated: None,
        }
    }

    /// Register a callback invoked on every rising edge.
    pub fn on_chord_activated(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_activated = Some(Box::new(callback));
        self
    }

    /// Returns `true` when this press completed the chord.
    pub fn on_key_down(&mut self, key: Key) -> bool {
        self.held.insert(key);
        self.update()
    }

    pub fn on_key_up(&mut self, key: Key) {
        self.held.remove(&key);
        self.update();
    }

    pub fn feed(&mut self, event: KeyEvent) -> bool {
        match event {
            KeyEvent::Press(k) => self.on_key_down(k),
            KeyEvent::Release(k) => {
                self.on_key_up(k);
                false
            }
        }
    }

    pub fn chord_active(&self) -> bool {
        self.required.iter().all(|k| self.held.contains(k))
    }

    fn update(&mut self) -> bool {
        if self.chord_active() {
            if !self.triggered {
                self.triggered = true;
                tracing::debug!(held = ?self.held, "hotkey match");
                if let Some(cb) = self.on_activated.as_mut() {
                    cb();
                }
                return true;
            }
        } else {
            if self.triggered {
                tracing::debug!("chord released");
            }
            self.triggered = false;
        }
        false
    }
}

/// Running OS keyboard hook. The hook thread lives for the rest of the
/// process; dropping this handle does not uninstall it.
pub struct HotkeyListener {
    hotkey: Hotkey,
    _thread: JoinHandle<()>,
}

impl HotkeyListener {
    pub fn hotkey(&self) -> Hotkey {
        self.hotkey
    }
}

/// Install the global keyboard hook on a dedicated thread.
///
/// `on_activate` runs on the listener thread and must only hand a message to
/// the control thread. Returns [`OverlayError::HookUnavailable`] when the hook
/// cannot be installed; the caller then falls back to manual toggling.
#[cfg(any(target_os = "windows", target_os = "macos"))]
pub fn start_listener<F>(hotkey: Hotkey, on_activate: F) -> Result<HotkeyListener, OverlayError>
where
    F: Fn() + Send + 'static,
{
    use rdev::{listen, EventType};
    use std::sync::mpsc::{sync_channel, RecvTimeoutError};
    use std::time::Duration;

    // `listen` only returns early on failure, so silence during the probe
    // window means the hook is installed.
    const HOOK_PROBE: Duration = Duration::from_millis(250);

    tracing::debug!("starting hotkey listener for {hotkey}");
    let (ready_tx, ready_rx) = sync_channel::<String>(1);
    let thread = std::thread::Builder::new()
        .name("hotkey-listener".into())
        .spawn(move || {
            let mut detector = ChordDetector::new(hotkey).on_chord_activated(on_activate);
            let result = listen(move |event| {
                let key_event = match event.event_type {
                    EventType::KeyPress(k) => map_rdev_key(k).map(KeyEvent::Press),
                    EventType::KeyRelease(k) => map_rdev_key(k).map(KeyEvent::Release),
                    _ => None,
                };
                if let Some(ev) = key_event {
                    detector.feed(ev);
                }
            });
            match result {
                Ok(()) => tracing::warn!("hotkey listener exited unexpectedly"),
                Err(e) => {
                    tracing::warn!("hotkey listener failed: {e:?}");
                    let _ = ready_tx.send(format!("{e:?}"));
                }
            }
        })
        .map_err(|e| OverlayError::HookUnavailable(e.to_string()))?;

    match ready_rx.recv_timeout(HOOK_PROBE) {
        Err(RecvTimeoutError::Timeout) => {
            tracing::info!("global hotkey {hotkey} registered");
            Ok(HotkeyListener {
                hotkey,
                _thread: thread,
            })
        }
        Ok(msg) => Err(OverlayError::HookUnavailable(msg)),
        Err(RecvTimeoutError::Disconnected) => Err(OverlayError::HookUnavailable(
            "keyboard listener stopped during start-up".into(),
        )),
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub fn start_listener<F>(hotkey: Hotkey, _on_activate: F) -> Result<HotkeyListener, OverlayError>
where
    F: Fn() + Send + 'static,
{
    tracing::debug!("global hotkey {hotkey} requested on unsupported platform");
    Err(OverlayError::HookUnavailable(
        "global keyboard hooks are not supported on this platform".into(),
    ))
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
fn map_rdev_key(key: rdev::Key) -> Option<Key> {
    use rdev::Key as R;
    Some(match key {
        R::ControlLeft | R::ControlRight => Key::Control,
        R::ShiftLeft | R::ShiftRight => Key::Shift,
        R::Alt | R::AltGr => Key::Alt,
        R::MetaLeft | R::MetaRight => Key::Meta,
        R::Space => Key::Space,
        R::Tab => Key::Tab,
        R::Return => Key::Return,
        R::Escape => Key::Escape,
        R::Delete => Key::Delete,
        R::Backspace => Key::Backspace,
        R::CapsLock => Key::CapsLock,
        R::Home => Key::Home,
        R::End => Key::End,
        R::PageUp => Key::PageUp,
        R::PageDown => Key::PageDown,
        R::LeftArrow => Key::LeftArrow,
        R::RightArrow => Key::RightArrow,
        R::UpArrow => Key::UpArrow,
        R::DownArrow => Key::DownArrow,
        R::F1 => Key::F(1),
        R::F2 => Key::F(2),
        R::F3 => Key::F(3),
        R::F4 => Key::F(4),
        R::F5 => Key::F(5),
        R::F6 => Key::F(6),
        R::F7 => Key::F(7),
        R::F8 => Key::F(8),
        R::F9 => Key::F(9),
        R::F10 => Key::F(10),
        R::F11 => Key::F(11),
        R::F12 => Key::F(12),
        R::Num0 => Key::Char('0'),
        R::Num1 => Key::Char('1'),
        R::Num2 => Key::Char('2'),
        R::Num3 => Key::Char('3'),
        R::Num4 => Key::Char('4'),
        R::Num5 => Key::Char('5'),
        R::Num6 => Key::Char('6'),
        R::Num7 => Key::Char('7'),
        R::Num8 => Key::Char('8'),
        R::Num9 => Key::Char('9'),
        R::KeyA => Key::Char('A'),
        R::KeyB => Key::Char('B'),
        R::KeyC => Key::Char('C'),
        R::KeyD => Key::Char('D'),
        R::KeyE => Key::Char('E'),
        R::KeyF => Key::Char('F'),
        R::KeyG => Key::Char('G'),
        R::KeyH => Key::Char('H'),
        R::KeyI => Key::Char('I'),
        R::KeyJ => Key::Char('J'),
        R::KeyK => Key::Char('K'),
        R::KeyL => Key::Char('L'),
        R::KeyM => Key::Char('M'),
        R::KeyN => Key::Char('N'),
        R::KeyO => Key::Char('O'),
        R::KeyP => Key::Char('P'),
        R::KeyQ => Key::Char('Q'),
        R::KeyR => Key::Char('R'),
        R::KeyS => Key::Char('S'),
        R::KeyT => Key::Char('T'),
        R::KeyU => Key::Char('U'),
        R::KeyV => Key::Char('V'),
        R::KeyW => Key::Char('W'),
        R::KeyX => Key::Char('X'),
        R::KeyY => Key::Char('Y'),
        R::KeyZ => Key::Char('Z'),
        _ => return None,
    })
}
