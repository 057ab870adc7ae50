use crate::client::{model_display_name, GeminiClient, AVAILABLE_MODELS};
use crate::clipboard;
use crate::credential::{validate_key, CredentialStore};
use crate::history::Role;
use crate::modes::Mode;
use crate::quick_commands::QUICK_COMMANDS;
use crate::session::{KeyCheck, KeyVerdict, OverlaySession, SubmitOutcome, Transition};
use crate::settings::Settings;
use crate::visibility::{Visibility, WindowCommand};
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub struct OverlayApp {
    session: OverlaySession,
    settings: Settings,
    settings_path: PathBuf,
    credentials: Box<dyn CredentialStore>,
    api_key: Option<String>,
    /// Without a global hook the window is minimised instead of moved off
    /// screen, so the taskbar entry can bring it back.
    hook_available: bool,
    hotkey_label: String,
    awaiting_minimize: bool,
    focus_input: bool,
    api_key_input: String,
    show_api_key: bool,
    pin_input: String,
    show_commands: bool,
    status: Option<String>,
}

impl OverlayApp {
    pub fn new(
        session: OverlaySession,
        settings: Settings,
        settings_path: PathBuf,
        credentials: Box<dyn CredentialStore>,
        api_key: Option<String>,
        hook_available: bool,
    ) -> Self {
        let hotkey_label = settings.hotkey().to_string();
        Self {
            session,
            settings,
            settings_path,
            credentials,
            api_key,
            hook_available,
            hotkey_label,
            awaiting_minimize: false,
            focus_input: false,
            api_key_input: String::new(),
            show_api_key: false,
            pin_input: String::new(),
            show_commands: false,
            status: None,
        }
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings.save(&self.settings_path) {
            tracing::error!("failed to save settings: {e}");
        }
    }

    fn configure_client(&mut self, key: String) {
        match GeminiClient::new(self.settings.client_config(key.clone())) {
            Ok(client) => {
                self.session.set_client(Some(Arc::new(client)));
                self.api_key = Some(key);
            }
            Err(e) => {
                tracing::warn!("{e}");
                self.status = Some(e.display_message());
            }
        }
    }

    /// Send a test request with the entered key. It is stored once the
    /// session reports the verdict, see [`OverlayApp::finish_key_check`].
    fn test_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        if let Err(e) = validate_key(&key) {
            self.status = Some(e.display_message());
            return;
        }
        match GeminiClient::new(self.settings.client_config(key.clone())) {
            Ok(client) => {
                if self.session.check_key(key, Arc::new(client)) {
                    self.status = Some("Testing API key...".into());
                }
            }
            Err(e) => self.status = Some(e.display_message()),
        }
    }

    fn finish_key_check(&mut self, check: KeyCheck) {
        if !check.verdict.accepted() {
            if let KeyVerdict::Rejected(e) = &check.verdict {
                self.status = Some(e.display_message());
            }
            return;
        }
        if let Err(e) = self.credentials.save(&check.key) {
            tracing::error!("{e}");
            self.status = Some(e.display_message());
            return;
        }
        self.api_key = Some(check.key);
        self.api_key_input.clear();
        self.show_api_key = false;
        self.status = Some(match check.verdict {
            KeyVerdict::Unverified(e) => {
                format!("⚠️ Could not verify the API key ({e}). It was saved anyway.")
            }
            _ => "✅ API key saved and verified".into(),
        });
    }

    fn select_model(&mut self, model: String) {
        tracing::info!("model changed to {model}");
        self.settings.model = model;
        self.save_settings();
        if let Some(key) = self.api_key.clone() {
            self.configure_client(key);
        }
    }

    fn select_mode(&mut self, mode: Mode) {
        self.session.set_mode(mode);
        self.settings.mode = mode;
        self.save_settings();
    }

    fn submit(&mut self) {
        self.status = match self.session.submit_input() {
            SubmitOutcome::Unconfigured => {
                self.show_api_key = true;
                Some("Enter an API key to start chatting.".into())
            }
            SubmitOutcome::Busy => Some("Still waiting for the previous response.".into()),
            _ => None,
        };
        self.focus_input = true;
    }

    fn request_hide(&mut self) {
        if self.session.hide() == Transition::RefusedWhileLoading {
            self.status = Some("Still waiting for a response, try again in a moment.".into());
        }
    }

    fn apply_window_commands(&mut self, ctx: &egui::Context) {
        for cmd in self.session.take_window_commands() {
            match cmd {
                WindowCommand::Show => {
                    let (x, y) = self.settings.window_pos();
                    ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(egui::pos2(x, y)));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(false));
                }
                WindowCommand::Focus => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                    self.focus_input = true;
                }
                WindowCommand::Hide => {
                    if self.hook_available {
                        let (x, y) = self.settings.offscreen_pos();
                        ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(
                            egui::pos2(x, y),
                        ));
                    } else {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
                        self.awaiting_minimize = true;
                    }
                }
            }
        }
    }

    /// Manual toggle path: restoring the minimised window shows the overlay.
    fn watch_manual_restore(&mut self, ctx: &egui::Context) {
        if self.hook_available || self.session.visibility() != Visibility::Hidden {
            return;
        }
        match ctx.input(|i| i.viewport().minimized) {
            Some(true) => self.awaiting_minimize = false,
            Some(false) if !self.awaiting_minimize => {
                self.session.show();
            }
            _ => {}
        }
    }

    fn header(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("🤖 Gemini Overlay");

            let mut mode = self.session.mode();
            egui::ComboBox::from_id_source("mode")
                .selected_text(mode.label())
                .show_ui(ui, |ui| {
                    for m in Mode::ALL {
                        ui.selectable_value(&mut mode, m, m.label());
                    }
                });
            if mode != self.session.mode() {
                self.select_mode(mode);
            }

            let mut model = self.settings.model.clone();
            let model_label = model_display_name(&model).to_string();
            egui::ComboBox::from_id_source("model")
                .selected_text(model_label)
                .show_ui(ui, |ui| {
                    for (name, id) in AVAILABLE_MODELS {
                        ui.selectable_value(&mut model, id.to_string(), *name);
                    }
                });
            if model != self.settings.model {
                self.select_model(model);
            }

            if self.session.is_configured() {
                ui.colored_label(egui::Color32::GREEN, "🟢 Connected");
            } else {
                ui.colored_label(egui::Color32::RED, "🔴 No API Key");
            }
        });
    }

    fn welcome_text(&self) -> String {
        let pinned = self.session.pinned().len();
        let pinned_info = if pinned > 0 {
            format!("\n📌 Pinned Context: {pinned} items")
        } else {
            String::new()
        };
        format!(
            "👋 Welcome to Gemini Overlay!\n\n\
             🎭 Current Mode: {}\n\
             🤖 Current Model: {}{pinned_info}\n\n\
             💡 Features:\n\
             • Type /summarize, /translate, /explain ... or open Commands\n\
             • Change modes and models using the dropdowns above\n\
             • Pin context that should accompany every question\n\
             • Copy the last response with Copy Last\n\
             • Use {} from anywhere to toggle the window",
            self.session.mode().label(),
            model_display_name(&self.settings.model),
            self.hotkey_label,
        )
    }

    fn transcript(&mut self, ui: &mut egui::Ui) {
        let height = (ui.available_height() - 150.0).max(80.0);
        egui::ScrollArea::vertical()
            .max_height(height)
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                if self.session.context().is_empty() && !self.session.is_loading() {
                    ui.label(self.welcome_text());
                    return;
                }
                for entry in self.session.context().entries() {
                    let who = match entry.role {
                        Role::User => "You",
                        Role::Assistant => "Gemini",
                    };
                    let ts = chrono::DateTime::from_timestamp(entry.timestamp, 0)
                        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M").to_string())
                        .unwrap_or_default();
                    let tag = entry
                        .mode_tag
                        .as_deref()
                        .map(|m| format!(" • {m}"))
                        .unwrap_or_default();
                    ui.label(egui::RichText::new(format!("[{ts}{tag}] {who}:")).strong());
                    if entry.is_error {
                        ui.colored_label(egui::Color32::LIGHT_RED, entry.text.as_str());
                    } else {
                        ui.label(entry.text.as_str());
                    }
                    ui.add_space(6.0);
                }
                if self.session.is_loading() {
                    ui.weak(self.session.response());
                }
            });
    }

    fn input_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let enabled = self.session.input_enabled();
            let hint = if enabled {
                "Ask Gemini anything... (Enter to send)"
            } else {
                "Loading..."
            };
            let width = (ui.available_width() - 90.0).max(100.0);
            let edit = egui::TextEdit::singleline(self.session.input_mut())
                .hint_text(hint)
                .desired_width(width);
            let response = ui.add_enabled(enabled, edit);
            if self.focus_input && enabled {
                response.request_focus();
                self.focus_input = false;
            }
            let entered = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let label = if self.session.is_loading() { "Sending..." } else { "Send" };
            let clicked = ui.add_enabled(enabled, egui::Button::new(label)).clicked();
            if entered || clicked {
                self.submit();
            }
        });
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Clear").clicked() {
                self.session.clear_history();
            }
            if ui.button("Copy Last").clicked() {
                self.status = match clipboard::copy_last_response(self.session.last_response()) {
                    Ok(true) => Some("Last response copied to clipboard".into()),
                    Ok(false) => Some("No response to copy".into()),
                    Err(e) => {
                        tracing::warn!("clipboard copy failed: {e:#}");
                        Some(format!("Copy failed: {e}"))
                    }
                };
            }
            if ui.button("Commands").clicked() {
                self.show_commands = !self.show_commands;
            }
            if ui.button("API Key").clicked() {
                self.show_api_key = !self.show_api_key;
            }
            let mut multi = self.session.multi_turn();
            if ui.checkbox(&mut multi, "Multi-turn").changed() {
                self.session.set_multi_turn(multi);
                self.settings.multi_turn = multi;
                self.save_settings();
            }
            if ui.button("Hide").clicked() {
                self.request_hide();
            }
        });

        let title = format!("📌 Pinned Context ({})", self.session.pinned().len());
        ui.collapsing(title, |ui| {
            let mut remove = None;
            for (i, item) in self.session.pinned().items().iter().enumerate() {
                ui.horizontal(|ui| {
                    let short: String = item.chars().take(60).collect();
                    let ellipsis = if item.chars().count() > 60 { "..." } else { "" };
                    ui.label(format!("• {short}{ellipsis}"));
                    if ui.small_button("Remove").clicked() {
                        remove = Some(i);
                    }
                });
            }
            if let Some(i) = remove {
                self.session.unpin(i);
            }
            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut self.pin_input);
                if ui.button("Add").clicked() && self.session.pin(&self.pin_input) {
                    self.pin_input.clear();
                }
                if ui.button("Clear All").clicked() {
                    self.session.clear_pins();
                }
            });
        });

        if self.show_api_key || !self.session.is_configured() {
            ui.horizontal(|ui| {
                ui.label("API Key:");
                let edit = egui::TextEdit::singleline(&mut self.api_key_input)
                    .password(true)
                    .hint_text("Paste your Gemini API key here...");
                let response = ui.add(edit);
                let entered = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let idle = !self.session.is_checking_key();
                let label = if idle { "Save & Test" } else { "Testing..." };
                let clicked = ui.add_enabled(idle, egui::Button::new(label)).clicked();
                if idle && (clicked || entered) {
                    self.test_api_key();
                }
            });
        }

        if let Some(status) = &self.status {
            ui.weak(status.as_str());
        }
    }

    fn commands_window(&mut self, ctx: &egui::Context) {
        if !self.show_commands {
            return;
        }
        let mut chosen = None;
        egui::Window::new("Quick Commands")
            .open(&mut self.show_commands)
            .collapsible(false)
            .show(ctx, |ui| {
                ui.label("Click a command to insert it into the input box.");
                for cmd in QUICK_COMMANDS {
                    ui.horizontal(|ui| {
                        if ui.button(cmd.token).clicked() {
                            chosen = Some(cmd.token);
                        }
                        ui.label(cmd.description);
                    });
                }
            });
        if let Some(token) = chosen {
            *self.session.input_mut() = format!("{token} ");
            self.show_commands = false;
            self.focus_input = true;
        }
    }
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let opacity = self.session.tick();
        if let Some(check) = self.session.take_key_check() {
            self.finish_key_check(check);
        }
        self.apply_window_commands(ctx);
        self.watch_manual_restore(ctx);

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.request_hide();
        }

        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        let frame = egui::Frame::none()
            .fill(egui::Color32::from_rgba_unmultiplied(24, 24, 24, alpha))
            .rounding(10.0)
            .inner_margin(12.0);
        let interactive = self.session.visibility() != Visibility::Hidden;
        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            // parked off screen: nothing may take keyboard input
            ui.set_enabled(interactive);
            ui.visuals_mut().override_text_color = Some(egui::Color32::from_white_alpha(alpha));
            self.header(ui);
            ui.separator();
            self.transcript(ui);
            ui.separator();
            self.input_row(ui);
            self.controls(ui);
        });
        if interactive {
            self.commands_window(ctx);
        }

        if self.session.is_animating() {
            ctx.request_repaint_after(self.session.fade_tick());
        } else if self.session.is_loading() || self.session.is_checking_key() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0, 0.0, 0.0, 0.0]
    }
}

/// Open the overlay window and run the UI loop until it is closed.
pub fn run(app: OverlayApp) -> anyhow::Result<()> {
    let (w, h) = app.settings.window_size();
    let (x, y) = if app.session.visibility().is_shown() {
        app.settings.window_pos()
    } else {
        app.settings.offscreen_pos()
    };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Gemini Overlay")
            .with_inner_size([w, h])
            .with_position([x, y])
            .with_decorations(false)
            .with_transparent(true)
            .with_always_on_top(),
        ..Default::default()
    };

    eframe::run_native(
        "Gemini Overlay",
        options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            app.session.set_waker(move || ctx.request_repaint());
            Box::new(app)
        }),
    )
    .map_err(|e| anyhow::anyhow!("failed to open overlay window: {e}"))
}
