use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{bounded, Sender};

use crate::analysis::recognizer::GestureDirection;

/// One session event.
#[derive(Debug)]
pub enum LogEntry {
    /// Listening started or stopped.
    Listening { timestamp: u64, on: bool },
    /// A gesture fired (post-debounce) and what dispatch made of it.
    Gesture {
        timestamp: u64,
        direction: GestureDirection,
        outcome: &'static str,
    },
    /// The inactivity watchdog raised its alarm.
    Alarm { timestamp: u64 },
    /// Session end marker.
    End,
}

fn direction_tag(direction: GestureDirection) -> &'static str {
    match direction {
        GestureDirection::Up => "up",
        GestureDirection::Down => "down",
        GestureDirection::Left => "left",
        GestureDirection::Right => "right",
    }
}

/// NDJSON session logger. File IO runs on a background thread so senders
/// (the listener thread, the command layer) never block.
pub struct SessionLogger {
    pub log_path: PathBuf,
    _handle: thread::JoinHandle<()>,
}

impl SessionLogger {
    /// Start the logger and return a cloneable entry `Sender`.
    pub fn start(log_path: PathBuf) -> (Self, Sender<LogEntry>) {
        let (tx, rx) = bounded::<LogEntry>(512);
        let path_clone = log_path.clone();

        let handle = thread::spawn(move || {
            if let Some(parent) = path_clone.parent() {
                let _ = fs::create_dir_all(parent);
            }

            let file = match File::create(&path_clone) {
                Ok(f) => f,
                Err(e) => {
                    tracing::error!("SessionLogger: failed to create {:?}: {}", path_clone, e);
                    return;
                }
            };

            let mut writer = BufWriter::new(file);

            let _ = writeln!(
                writer,
                r#"{{"type":"meta","session_start":{}}}"#,
                now_ms()
            );

            tracing::info!("SessionLogger: writing to {:?}", path_clone);

            while let Ok(entry) = rx.recv() {
                match entry {
                    LogEntry::Listening { timestamp, on } => {
                        let _ = writeln!(
                            writer,
                            r#"{{"type":"listening","t":{},"on":{}}}"#,
                            timestamp, on,
                        );
                    }
                    LogEntry::Gesture {
                        timestamp,
                        direction,
                        outcome,
                    } => {
                        let _ = writeln!(
                            writer,
                            r#"{{"type":"gesture","t":{},"direction":"{}","outcome":"{}"}}"#,
                            timestamp,
                            direction_tag(direction),
                            outcome,
                        );
                    }
                    LogEntry::Alarm { timestamp } => {
                        let _ = writeln!(writer, r#"{{"type":"alarm","t":{}}}"#, timestamp);
                    }
                    LogEntry::End => {
                        let _ = writeln!(
                            writer,
                            r#"{{"type":"meta","session_end":{}}}"#,
                            now_ms()
                        );
                        break;
                    }
                }

                let _ = writer.flush();
            }

            let _ = writer.flush();
            tracing::info!("SessionLogger: session closed");
        });

        let logger = Self {
            log_path,
            _handle: handle,
        };

        (logger, tx)
    }
}

/// UNIX time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Documents/headwave-sessions/headwave_YYYYMMDD_HHMMSS.ndjson
pub fn default_log_path() -> PathBuf {
    let base = std::env::var("USERPROFILE")
        .or_else(|_| std::env::var("HOME"))
        .unwrap_or_else(|_| ".".to_string());

    let dir = PathBuf::from(base)
        .join("Documents")
        .join("headwave-sessions");

    dir.join(format!("headwave_{}.ndjson", timestamp_filename()))
}

/// chrono-free UTC timestamp string; identifies the session, precision is
/// not a goal.
fn timestamp_filename() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let days_since_epoch = secs / 86400;
    let time_of_day = secs % 86400;
    let h = time_of_day / 3600;
    let m = (time_of_day % 3600) / 60;
    let s = time_of_day % 60;

    // Gregorian conversion via Julian day number (UNIX epoch = JD 2440588).
    let jd = days_since_epoch + 2440588;
    let a = jd + 32044;
    let b = (4 * a + 3) / 146097;
    let c = a - (146097 * b) / 4;
    let d = (4 * c + 3) / 1461;
    let e = c - (1461 * d) / 4;
    let m_cal = (5 * e + 2) / 153;
    let day = e - (153 * m_cal + 2) / 5 + 1;
    let month = m_cal + 3 - 12 * (m_cal / 10);
    let year = 100 * b + d - 4800 + m_cal / 10;

    format!("{:04}{:02}{:02}_{:02}{:02}{:02}", year, month, day, h, m, s)
}
