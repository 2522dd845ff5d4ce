// Listening session: one consumer thread merging the sample stream with the
// watchdog's 1 Hz tick.
//
// The recognizer and watchdog are plain synchronous consumers owned by that
// thread; the only data shared across threads is the observable snapshot and
// the settings table. Stopping tears the whole session down synchronously so
// the next start behaves as a cold start.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};

use crate::action::{ActionDispatcher, DispatchOutcome};
use crate::analysis::recognizer::{GestureDirection, GestureRecognizer};
use crate::analysis::watchdog::InactivityWatchdog;
use crate::logger::{now_ms, LogEntry};
use crate::motion::{MotionSource, OrientationSample};
use crate::settings::{Settings, SharedSettings};

/// Read-only snapshot the presentation layer polls.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineStatus {
    pub listening: bool,
    pub connected: bool,
    pub pitch: f64,
    pub yaw: f64,
    pub last_gesture: Option<GestureDirection>,
    pub alarm_active: bool,
    pub recording: bool,
    pub permission_granted: bool,
}

#[derive(Debug, Default)]
struct ObservedInner {
    listening: bool,
    connected: bool,
    pitch: f64,
    yaw: f64,
    last_gesture: Option<GestureDirection>,
    alarm_active: bool,
}

/// Observable fields shared between the listener thread and the commands.
#[derive(Default)]
pub struct Observed {
    inner: Mutex<ObservedInner>,
}

impl Observed {
    fn lock(&self) -> std::sync::MutexGuard<'_, ObservedInner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn set_attitude(&self, pitch: f64, yaw: f64) {
        let mut g = self.lock();
        g.pitch = pitch;
        g.yaw = yaw;
    }

    fn set_last_gesture(&self, direction: GestureDirection) {
        self.lock().last_gesture = Some(direction);
    }

    fn set_alarm(&self, active: bool) {
        self.lock().alarm_active = active;
    }

    pub fn alarm_active(&self) -> bool {
        self.lock().alarm_active
    }

    fn set_session(&self, listening: bool, connected: bool) {
        let mut g = self.lock();
        g.listening = listening;
        g.connected = connected;
    }

    /// Cold-start wipe on stop.
    fn clear(&self) {
        *self.lock() = ObservedInner::default();
    }

    pub fn snapshot(&self, recording: bool, permission_granted: bool) -> PipelineStatus {
        let g = self.lock();
        PipelineStatus {
            listening: g.listening,
            connected: g.connected,
            pitch: g.pitch,
            yaw: g.yaw,
            last_gesture: g.last_gesture,
            alarm_active: g.alarm_active,
            recording,
            permission_granted,
        }
    }
}

enum ListenerCommand {
    Stop,
    ResetAlarm,
}

struct ActiveListener {
    control_tx: Sender<ListenerCommand>,
    source: Box<dyn MotionSource>,
    join: thread::JoinHandle<()>,
}

pub struct ListenerManager {
    settings: SharedSettings,
    dispatcher: Arc<ActionDispatcher>,
    observed: Arc<Observed>,
    log_tx: Sender<LogEntry>,
    source_factory: Box<dyn Fn() -> Box<dyn MotionSource> + Send + Sync>,
    active: Mutex<Option<ActiveListener>>,
    /// Convenience mirror of "a session exists", readable without the lock.
    listening: AtomicBool,
}

impl ListenerManager {
    pub fn new(
        settings: SharedSettings,
        dispatcher: Arc<ActionDispatcher>,
        observed: Arc<Observed>,
        log_tx: Sender<LogEntry>,
        source_factory: Box<dyn Fn() -> Box<dyn MotionSource> + Send + Sync>,
    ) -> Self {
        Self {
            settings,
            dispatcher,
            observed,
            log_tx,
            source_factory,
            active: Mutex::new(None),
            listening: AtomicBool::new(false),
        }
    }

    fn active_lock(&self) -> std::sync::MutexGuard<'_, Option<ActiveListener>> {
        match self.active.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Begin a listening session. The sampler is consulted once, up front:
    /// if it is unavailable the start is refused and no retry loop exists.
    pub fn start(&self) -> Result<(), String> {
        let mut active = self.active_lock();
        if active.is_some() {
            return Ok(()); // already listening
        }

        let mut source = (self.source_factory)();
        if !source.is_available() {
            tracing::warn!("listening refused: motion source unavailable");
            return Err("headphone motion data is not available".to_string());
        }

        let (sample_tx, sample_rx) = bounded::<OrientationSample>(256);
        let (control_tx, control_rx) = bounded::<ListenerCommand>(4);

        source.start(sample_tx).map_err(|e| e.to_string())?;

        // Permission is probed eagerly so the banner shows before the first
        // gesture instead of after it.
        self.dispatcher.refresh_permission();

        let settings = self.settings.clone();
        let dispatcher = self.dispatcher.clone();
        let observed = self.observed.clone();
        let log_tx = self.log_tx.clone();

        observed.set_session(true, true);
        let _ = log_tx.try_send(LogEntry::Listening {
            timestamp: now_ms(),
            on: true,
        });
        tracing::info!("listening started");

        let join = thread::spawn(move || {
            run_loop(sample_rx, control_rx, settings, dispatcher, observed, log_tx);
        });

        *active = Some(ActiveListener {
            control_tx,
            source,
            join,
        });
        self.listening.store(true, Ordering::Release);
        Ok(())
    }

    /// Synchronously halt sample delivery, cancel the watchdog tick and wipe
    /// all internal state.
    pub fn stop(&self) {
        let Some(mut active) = self.active_lock().take() else {
            return;
        };
        self.listening.store(false, Ordering::Release);

        let _ = active.control_tx.send(ListenerCommand::Stop);
        active.source.stop();
        if active.join.join().is_err() {
            tracing::error!("listener thread panicked");
        }

        self.observed.clear();
        let _ = self.log_tx.try_send(LogEntry::Listening {
            timestamp: now_ms(),
            on: false,
        });
        tracing::info!("listening stopped");
    }

    /// Acknowledge the wake-me alarm: clears the sticky flag and restarts the
    /// inactivity countdown.
    pub fn reset_alarm(&self) {
        self.observed.set_alarm(false);
        if let Some(active) = self.active_lock().as_ref() {
            let _ = active.control_tx.send(ListenerCommand::ResetAlarm);
        }
    }
}

fn read_settings(settings: &SharedSettings) -> Settings {
    match settings.read() {
        Ok(g) => g.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn run_loop(
    mut sample_rx: Receiver<OrientationSample>,
    control_rx: Receiver<ListenerCommand>,
    settings: SharedSettings,
    dispatcher: Arc<ActionDispatcher>,
    observed: Arc<Observed>,
    log_tx: Sender<LogEntry>,
) {
    let ticker = tick(Duration::from_secs(1));
    let mut recognizer = GestureRecognizer::new();
    let mut watchdog = InactivityWatchdog::new();
    watchdog.start(Instant::now());

    loop {
        select! {
            recv(control_rx) -> msg => match msg {
                Ok(ListenerCommand::Stop) | Err(_) => break,
                Ok(ListenerCommand::ResetAlarm) => {
                    watchdog.reset_alarm(Instant::now());
                    observed.set_alarm(false);
                }
            },
            recv(sample_rx) -> msg => {
                let sample = match msg {
                    Ok(s) => s,
                    Err(_) => {
                        // Sampler went away mid-session. Surface the status
                        // and stop selecting on the dead channel; the
                        // watchdog keeps ticking until an explicit stop.
                        tracing::warn!("sample stream closed; marking disconnected");
                        observed.set_session(true, false);
                        sample_rx = crossbeam_channel::never();
                        continue;
                    }
                };
                on_sample(
                    &sample,
                    &settings,
                    &dispatcher,
                    &observed,
                    &log_tx,
                    &mut recognizer,
                    &mut watchdog,
                );
            },
            recv(ticker) -> _ => {
                let wake = read_settings(&settings).wake_me;
                if watchdog.on_tick(Instant::now(), &wake) {
                    observed.set_alarm(true);
                    dispatcher.dispatch_alarm(&wake);
                    let _ = log_tx.try_send(LogEntry::Alarm { timestamp: now_ms() });
                    tracing::info!("inactivity alarm fired");
                }
            },
        }
    }

    recognizer.reset();
}

fn on_sample(
    sample: &OrientationSample,
    settings: &SharedSettings,
    dispatcher: &ActionDispatcher,
    observed: &Observed,
    log_tx: &Sender<LogEntry>,
    recognizer: &mut GestureRecognizer,
    watchdog: &mut InactivityWatchdog,
) {
    observed.set_attitude(sample.pitch, sample.yaw);

    // Sensitivities are re-read every tick so retuning applies while
    // listening.
    let snapshot = read_settings(settings);
    watchdog.on_sample(sample, snapshot.wake_me.sensitivity);

    let Some(direction) = recognizer.on_sample(sample, &snapshot.sensitivities()) else {
        return;
    };
    observed.set_last_gesture(direction);

    let outcome = match dispatcher.dispatch(direction, &snapshot.direction(direction)) {
        Ok(DispatchOutcome::Posted) => "posted",
        Ok(DispatchOutcome::DirectionDisabled) => "disabled",
        Ok(DispatchOutcome::NothingRecorded) => "nothing_recorded",
        Ok(DispatchOutcome::PermissionDenied) => "permission_denied",
        Err(e) => {
            // Not retried: a missed replay is recoverable by repeating the
            // gesture.
            tracing::error!(?direction, "dispatch failed: {}", e);
            "error"
        }
    };
    let _ = log_tx.try_send(LogEntry::Gesture {
        timestamp: now_ms(),
        direction,
        outcome,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{EventPoster, SoundPlayer, SystemControl};
    use crate::motion::{HeadphoneMotionSource, ScriptedMotionSource};
    use crate::settings;
    use std::sync::atomic::AtomicU32;

    struct CountingPoster(Arc<AtomicU32>);
    impl EventPoster for CountingPoster {
        fn post_key(&self, _: u16, _: u32, _: bool) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn post_system_control(&self, _: SystemControl) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SilentSound;
    impl SoundPlayer for SilentSound {
        fn play(&self, _: &str) -> bool {
            true
        }
        fn beep(&self) {}
    }

    fn manager(
        script: Vec<(f64, f64)>,
        posts: Arc<AtomicU32>,
    ) -> (ListenerManager, Arc<Observed>) {
        let shared = settings::shared(Settings::default());
        let dispatcher = Arc::new(ActionDispatcher::new(
            Box::new(CountingPoster(posts)),
            Box::new(SilentSound),
            Box::new(|| true),
        ));
        let observed = Arc::new(Observed::default());
        let (log_tx, _log_rx) = bounded(64);
        let mgr = ListenerManager::new(
            shared,
            dispatcher,
            observed.clone(),
            log_tx,
            Box::new(move || {
                Box::new(ScriptedMotionSource::new(
                    script.clone(),
                    Duration::from_millis(5),
                )) as Box<dyn MotionSource>
            }),
        );
        (mgr, observed)
    }

    #[test]
    fn unavailable_source_refuses_start() {
        let shared = settings::shared(Settings::default());
        let dispatcher = Arc::new(ActionDispatcher::new(
            Box::new(CountingPoster(Arc::new(AtomicU32::new(0)))),
            Box::new(SilentSound),
            Box::new(|| true),
        ));
        let (log_tx, _log_rx) = bounded(64);
        let mgr = ListenerManager::new(
            shared,
            dispatcher,
            Arc::new(Observed::default()),
            log_tx,
            Box::new(|| Box::new(HeadphoneMotionSource::new()) as Box<dyn MotionSource>),
        );

        assert!(mgr.start().is_err());
        assert!(!mgr.is_listening());
    }

    #[test]
    fn scripted_nod_reaches_the_poster() {
        let posts = Arc::new(AtomicU32::new(0));
        // Baseline, then a pitch jump well above the default threshold
        // (0.7 → 0.134 rad), then stillness.
        let (mgr, observed) = manager(
            vec![(0.0, 0.0), (0.5, 0.0), (0.5, 0.0)],
            posts.clone(),
        );

        mgr.start().unwrap();
        assert!(mgr.is_listening());

        // Give the scripted source and listener thread time to run through.
        for _ in 0..100 {
            if posts.load(Ordering::SeqCst) > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        // Default Up preset is a system control: down+up posted as one call.
        assert_eq!(posts.load(Ordering::SeqCst), 1);
        assert_eq!(
            observed.snapshot(false, true).last_gesture,
            Some(GestureDirection::Up)
        );

        mgr.stop();
        assert!(!mgr.is_listening());
        // Stop wipes the observable state for a cold restart.
        let status = observed.snapshot(false, true);
        assert!(!status.listening);
        assert_eq!(status.last_gesture, None);
    }

    #[test]
    fn stop_without_start_is_a_noop() {
        let (mgr, _) = manager(vec![], Arc::new(AtomicU32::new(0)));
        mgr.stop();
        assert!(!mgr.is_listening());
    }
}
