/*
 * logging.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Courier, an HTTP client library.
 *
 * Courier is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Courier is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Courier.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Logging sink injected at session construction.
//!
//! The library never installs a global logger. A session either forwards its
//! records to a caller-supplied `log::Log`, or to whatever logger the
//! application registered with the `log` facade.

use std::fmt;
use std::sync::Arc;

use log::{Level, Log, Record};

/// Target used for every record emitted by the library.
pub const TARGET: &str = "courier";

/// Handle used by sessions and adapters to emit log records.
#[derive(Clone, Default)]
pub struct Logger {
    sink: Option<Arc<dyn Log>>,
}

impl Logger {
    /// Forward records to the global `log` logger.
    pub fn global() -> Self {
        Self { sink: None }
    }

    /// Forward records to `sink` only.
    pub fn with_sink(sink: Arc<dyn Log>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let record = Record::builder()
            .level(level)
            .target(TARGET)
            .args(args)
            .build();
        match &self.sink {
            Some(sink) => {
                if sink.enabled(record.metadata()) {
                    sink.log(&record);
                }
            }
            None => {
                if level <= log::max_level() {
                    log::logger().log(&record);
                }
            }
        }
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn trace(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Trace, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("sink", &self.sink.as_ref().map(|_| "custom"))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use log::Metadata;
    use std::sync::Mutex;

    /// Sink that keeps every record it receives.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) records: Mutex<Vec<(Level, String)>>,
    }

    impl Log for RecordingSink {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            assert_eq!(record.target(), TARGET);
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    #[test]
    fn records_reach_injected_sink() {
        let sink = Arc::new(RecordingSink::default());
        let logger = Logger::with_sink(sink.clone());
        logger.debug(format_args!("connect {}:{}", "example.com", 80));
        logger.warn(format_args!("discarding connection"));
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (Level::Debug, "connect example.com:80".to_string()));
        assert_eq!(records[1].0, Level::Warn);
    }

    #[test]
    fn global_logger_without_registration_is_silent() {
        Logger::global().debug(format_args!("nobody listens"));
    }
}
