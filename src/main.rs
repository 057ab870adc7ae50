use gemini_overlay::client::{GeminiClient, GenerationClient};
use gemini_overlay::credential::{resolve_from_process_env, FileCredentialStore, API_KEY_FILE};
use gemini_overlay::fade::SystemClock;
use gemini_overlay::gui::{self, OverlayApp};
use gemini_overlay::history::{ConversationContext, JsonHistoryStore, HISTORY_FILE};
use gemini_overlay::hotkey;
use gemini_overlay::logging;
use gemini_overlay::session::OverlaySession;
use gemini_overlay::settings::{data_dir, Settings, SETTINGS_FILE};
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let dir = data_dir();
    let settings_path = dir.join(SETTINGS_FILE);
    let settings = Settings::load_or_default(&settings_path);
    logging::init(settings.debug_logging, settings.log_file.as_ref().map(PathBuf::from));
    tracing::info!("data directory: {}", dir.display());

    let credentials = FileCredentialStore::new(dir.join(API_KEY_FILE));
    tracing::debug!("API key file: {}", credentials.path().display());
    let api_key = match resolve_from_process_env(&credentials) {
        Some((key, source)) => {
            tracing::info!(?source, "API key found");
            Some(key)
        }
        None => {
            tracing::warn!("no API key configured; requests are disabled until one is entered");
            None
        }
    };
    let client: Option<Arc<dyn GenerationClient>> = match &api_key {
        Some(key) => match GeminiClient::new(settings.client_config(key.clone())) {
            Ok(c) => Some(Arc::new(c)),
            Err(e) => {
                tracing::error!("{e}");
                None
            }
        },
        None => None,
    };

    let history_store = JsonHistoryStore::new(dir.join(HISTORY_FILE));
    tracing::debug!("history file: {}", history_store.path().display());
    let context = ConversationContext::load(&history_store, settings.history_limit);
    let mut session = OverlaySession::new(settings.session_config(), context, Arc::new(SystemClock))
        .with_client(client)
        .with_history_store(Box::new(history_store));

    // Components are inert until here.
    let handle = session.handle();
    let hook_available = match hotkey::start_listener(settings.hotkey(), move || {
        handle.toggle();
    }) {
        Ok(listener) => {
            tracing::info!("press {} to toggle the overlay", listener.hotkey());
            true
        }
        Err(e) => {
            tracing::warn!("{e}; use the taskbar entry to bring the overlay back");
            false
        }
    };

    if settings.show_on_start || !session.is_configured() || !hook_available {
        session.show();
    }

    let app = OverlayApp::new(
        session,
        settings,
        settings_path,
        Box::new(credentials),
        api_key,
        hook_available,
    );
    gui::run(app)
}
