//! Logging backend that forwards records to an embedder-supplied sink
//!
//! The cache logs through the `log` facade and stays silent until a logger
//! is installed. Services that want cache logs (schema migrations, pruning)
//! in their own pipeline install this logger once and attach a sink.

use std::sync::{Arc, OnceLock, RwLock};

use log::{Level, Log, Metadata, Record, SetLoggerError};

/// Receiver for forwarded log records
pub trait LogSink: Send + Sync {
    fn on_log(&self, level: Level, target: &str, message: &str);
}

/// Global storage for the forwarding logger
static SINK_LOGGER: OnceLock<SinkLogger> = OnceLock::new();

struct SinkLogger {
    sink: RwLock<Option<Arc<dyn LogSink>>>,
    max_level: RwLock<Level>,
}

impl SinkLogger {
    fn new(max_level: Level) -> Self {
        Self {
            sink: RwLock::new(None),
            max_level: RwLock::new(max_level),
        }
    }

    fn set_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        if let Ok(mut guard) = self.sink.write() {
            *guard = sink;
        }
    }

    fn set_max_level(&self, level: Level) {
        if let Ok(mut guard) = self.max_level.write() {
            *guard = level;
        }
    }

    fn max_level(&self) -> Level {
        self.max_level.read().map(|l| *l).unwrap_or(Level::Info)
    }
}

impl Log for SinkLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level()
            && self.sink.read().is_ok_and(|sink| sink.is_some())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Ok(guard) = self.sink.read()
            && let Some(sink) = guard.as_ref()
        {
            let message = record.args().to_string();
            sink.on_log(record.level(), record.target(), &message);
        }
    }

    fn flush(&self) {}
}

/// Install the forwarding logger as the global logger
///
/// Records are dropped until a sink is attached with [`set_log_sink`].
/// Fails if another logger is already installed.
pub fn init_logger(max_level: Level) -> Result<(), SetLoggerError> {
    let logger = SINK_LOGGER.get_or_init(|| SinkLogger::new(max_level));
    log::set_logger(logger)?;
    log::set_max_level(max_level.to_level_filter());
    Ok(())
}

/// Attach (or with `None`, detach) the sink receiving log records
pub fn set_log_sink(sink: Option<Arc<dyn LogSink>>) {
    if let Some(logger) = SINK_LOGGER.get() {
        logger.set_sink(sink);
    }
}

/// Update the maximum log level
pub fn set_log_level(level: Level) {
    if let Some(logger) = SINK_LOGGER.get() {
        logger.set_max_level(level);
        log::set_max_level(level.to_level_filter());
    }
}
