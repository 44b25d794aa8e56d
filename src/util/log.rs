//! Session log
//!
//! Every line goes to stdout and, when a log file is configured, to that file
//! with a local timestamp prefix. Warnings go to stderr instead of stdout.
//! Debug lines are only emitted when debug output is enabled, and carry the
//! `DEBUG:` prefix.
//!
//! The log is created once by the binary and passed around behind an `Arc`.
//! Call [`SessionLog::finish`] before exit so buffered file output is flushed.

use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

pub struct SessionLog {
    file: Option<Mutex<BufWriter<File>>>,
    debug: bool,
}

impl SessionLog {
    /// Open the log, creating (truncating) `path` when given
    pub fn open(path: Option<&Path>, debug: bool) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create log file: {}", path.display()))?;
                Some(Mutex::new(BufWriter::new(file)))
            }
            None => None,
        };
        Ok(Self { file, debug })
    }

    /// Log to stdout only
    pub fn console_only(debug: bool) -> Self {
        Self { file: None, debug }
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    pub fn line(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        println!("{}", message);
        self.to_file(message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = format!("Warning: {}", message.as_ref());
        eprintln!("{}", message);
        self.to_file(&message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        if !self.debug {
            return;
        }
        let message = format!("DEBUG: {}", message.as_ref());
        eprintln!("{}", message);
        self.to_file(&message);
    }

    /// Flush the log file
    pub fn finish(&self) -> anyhow::Result<()> {
        if let Some(file) = &self.file {
            if let Ok(mut writer) = file.lock() {
                writer.flush().context("Failed to flush log file")?;
            }
        }
        Ok(())
    }

    fn to_file(&self, message: &str) {
        let Some(file) = &self.file else {
            return;
        };
        // A poisoned lock or failed write drops the line; stdout already has it
        if let Ok(mut writer) = file.lock() {
            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let _ = writeln!(writer, "[{}] {}", stamp, message);
        }
    }
}
