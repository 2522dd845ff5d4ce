pub mod action;
pub mod analysis;
pub mod input;
pub mod listener;
pub mod logger;
pub mod motion;
pub mod settings;

use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLockWriteGuard};
use std::thread;

use crossbeam_channel::Sender;
use tauri::State;
use tauri_plugin_opener::OpenerExt;

use crate::action::{ActionDispatcher, PresetAction};
use crate::analysis::recognizer::GestureDirection;
use crate::input::ShortcutRecorder;
use crate::listener::{ListenerManager, Observed, PipelineStatus};
use crate::logger::{LogEntry, SessionLogger};
use crate::motion::HeadphoneMotionSource;
use crate::settings::{ActionMode, Settings, SettingsStore, SharedSettings, WakeMeConfig};

const ACCESSIBILITY_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";

pub struct AppState {
    settings: SharedSettings,
    store: SettingsStore,
    manager: ListenerManager,
    recorder: ShortcutRecorder,
    dispatcher: Arc<ActionDispatcher>,
    observed: Arc<Observed>,
    _logger: SessionLogger,
    _log_tx: Sender<LogEntry>,
}

fn write_settings(settings: &SharedSettings) -> RwLockWriteGuard<'_, Settings> {
    match settings.write() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read_settings(settings: &SharedSettings) -> Settings {
    match settings.read() {
        Ok(g) => g.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Apply one mutation to the settings table and commit it to disk before
/// returning (read-after-write consistency for the presentation layer).
fn mutate_settings<F: FnOnce(&mut Settings)>(state: &AppState, f: F) {
    {
        let mut guard = write_settings(&state.settings);
        f(&mut guard);
    }
    state.store.save(&read_settings(&state.settings));
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[tauri::command]
fn get_pipeline_status(state: State<AppState>) -> PipelineStatus {
    state.observed.snapshot(
        state.recorder.is_capturing(),
        state.dispatcher.permission_flag().load(Ordering::Acquire),
    )
}

#[tauri::command]
fn get_settings(state: State<AppState>) -> Settings {
    read_settings(&state.settings)
}

#[tauri::command]
fn start_listening(state: State<AppState>) -> Result<(), String> {
    state.manager.start()
}

#[tauri::command]
fn stop_listening(state: State<AppState>) {
    state.manager.stop()
}

#[tauri::command]
fn set_direction_enabled(direction: GestureDirection, enabled: bool, state: State<AppState>) {
    mutate_settings(&state, |s| s.direction_mut(direction).enabled = enabled);
}

#[tauri::command]
fn set_direction_mode(direction: GestureDirection, mode: ActionMode, state: State<AppState>) {
    mutate_settings(&state, |s| s.direction_mut(direction).mode = mode);
}

#[tauri::command]
fn set_direction_preset(direction: GestureDirection, preset: PresetAction, state: State<AppState>) {
    mutate_settings(&state, |s| s.direction_mut(direction).preset = preset);
}

#[tauri::command]
fn set_direction_sensitivity(direction: GestureDirection, value: f64, state: State<AppState>) {
    let value = value.clamp(0.0, 1.0);
    mutate_settings(&state, |s| s.direction_mut(direction).sensitivity = value);
}

#[tauri::command]
fn set_wake_me_config(mut config: WakeMeConfig, state: State<AppState>) {
    config.sensitivity = config.sensitivity.clamp(0.0, 1.0);
    config.timeout_secs = config.timeout_secs.max(1);
    mutate_settings(&state, |s| s.wake_me = config);
}

#[tauri::command]
fn start_shortcut_recording(
    direction: GestureDirection,
    state: State<AppState>,
) -> Result<(), String> {
    state
        .recorder
        .start_recording(direction)
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn stop_shortcut_recording(state: State<AppState>) {
    state.recorder.stop_recording();
}

#[tauri::command]
fn reset_alarm(state: State<AppState>) {
    state.manager.reset_alarm();
}

#[tauri::command]
fn refresh_permission(state: State<AppState>) -> bool {
    state.dispatcher.refresh_permission()
}

#[tauri::command]
fn open_accessibility_settings(app: tauri::AppHandle) -> Result<(), String> {
    app.opener()
        .open_url(ACCESSIBILITY_SETTINGS_URL.to_string(), None::<String>)
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn quit_app() {
    std::process::exit(0);
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let store = SettingsStore::new(SettingsStore::default_path());
    let settings = settings::shared(store.load());

    let (session_logger, log_tx) = SessionLogger::start(logger::default_log_path());

    // Shortcut recorder + capture hook. Captured shortcuts arrive on the tap
    // thread and are committed to settings on a dedicated thread.
    let (capture_tx, capture_rx) = crossbeam_channel::bounded(8);
    let recorder = ShortcutRecorder::new(capture_tx);
    input::install_recorder(recorder.clone());
    #[cfg(target_os = "macos")]
    input::capture::start();

    {
        let settings = settings.clone();
        let store = SettingsStore::new(SettingsStore::default_path());
        thread::spawn(move || {
            while let Ok(captured) = capture_rx.recv() {
                {
                    let mut guard = write_settings(&settings);
                    guard.direction_mut(captured.direction).shortcut = Some(captured.shortcut);
                }
                store.save(&read_settings(&settings));
            }
        });
    }

    let dispatcher = Arc::new(ActionDispatcher::system());
    let observed = Arc::new(Observed::default());
    let manager = ListenerManager::new(
        settings.clone(),
        dispatcher.clone(),
        observed.clone(),
        log_tx.clone(),
        Box::new(|| Box::new(HeadphoneMotionSource::new()) as Box<dyn motion::MotionSource>),
    );

    let state = AppState {
        settings,
        store,
        manager,
        recorder,
        dispatcher,
        observed,
        _logger: session_logger,
        _log_tx: log_tx,
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .manage(state)
        .invoke_handler(tauri::generate_handler![
            get_pipeline_status,
            get_settings,
            start_listening,
            stop_listening,
            set_direction_enabled,
            set_direction_mode,
            set_direction_preset,
            set_direction_sensitivity,
            set_wake_me_config,
            start_shortcut_recording,
            stop_shortcut_recording,
            reset_alarm,
            refresh_permission,
            open_accessibility_settings,
            quit_app
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
