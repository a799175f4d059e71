//! File-backed event recorder.
//!
//! This module persists fleet events as dated log files, one folder per
//! event category and one file per subject per day. Writes happen on a
//! dedicated thread so `record` never blocks the fleet state lock.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use apron_fleet::{Event, EventSink};
use parking_lot::Mutex;

/// An [`EventSink`] that appends events to log files under a root directory.
///
/// Layout mirrors the event stream: `<root>/<category>/<subject>_<date>.log`,
/// with one timestamped line per event. A background thread drains a channel
/// and performs the actual file I/O.
pub struct FileRecorder {
    tx: Mutex<Option<mpsc::Sender<Event>>>,
    writer: Mutex<Option<thread::JoinHandle<()>>>,
}

impl FileRecorder {
    /// Create the root directory and start the writer thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created or the
    /// writer thread cannot be spawned.
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let (tx, rx) = mpsc::channel();
        let writer = thread::Builder::new()
            .name("event-recorder".into())
            .spawn(move || write_loop(&root, &rx))?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Flush and stop the writer thread. Safe to call more than once.
    pub fn close(&self) {
        // Dropping the sender ends the writer's recv loop.
        self.tx.lock().take();
        if let Some(writer) = self.writer.lock().take() {
            let _ = writer.join();
        }
    }
}

impl EventSink for FileRecorder {
    fn record(&self, event: Event) {
        if let Some(tx) = self.tx.lock().as_ref() {
            // A closed channel means the recorder is shutting down; the
            // event is dropped rather than blocking the caller.
            let _ = tx.send(event);
        }
    }
}

impl Drop for FileRecorder {
    fn drop(&mut self) {
        self.close();
    }
}

fn write_loop(root: &Path, rx: &mpsc::Receiver<Event>) {
    while let Ok(event) = rx.recv() {
        if let Err(error) = append(root, &event) {
            tracing::warn!(
                error = %error,
                subject = %event.subject,
                "Failed to write event log"
            );
        }
    }
}

fn append(root: &Path, event: &Event) -> io::Result<()> {
    let dir = root.join(event.category.to_string());
    fs::create_dir_all(&dir)?;

    let path = dir.join(format!(
        "{}_{}.log",
        file_stem(&event.subject),
        event.at.format("%Y-%m-%d")
    ));
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "[{}] {}",
        event.at.format("%Y-%m-%d %H:%M:%S"),
        event.message
    )
}

/// Turn a subject like `AGV-1` or `Main Storage` into a filesystem-safe
/// file stem (`agv-1`, `main-storage`).
fn file_stem(subject: &str) -> String {
    subject
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}
