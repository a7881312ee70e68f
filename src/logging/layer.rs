//! `tracing_subscriber::Layer` that routes events onto the async file
//! worker; console output stays on the `fmt` layer directly.
use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use super::worker::{LogRecord, LogWorkerHandle};

pub struct AsyncFileLayer {
    worker: LogWorkerHandle,
    min_level: Level,
}

impl AsyncFileLayer {
    pub fn new(worker: LogWorkerHandle, min_level: Level) -> Self {
        Self { worker, min_level }
    }
}

impl<S: Subscriber> Layer<S> for AsyncFileLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() < self.min_level {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "{} {:>5} {}: {}",
            Local::now().to_rfc3339(),
            metadata.level(),
            metadata.target(),
            visitor.message,
        );
        self.worker.try_send(LogRecord { line });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else if self.message.is_empty() {
            self.message = format!("{}={:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

/// Maps the five-level scheme from `LOGGING_LEVEL` onto `tracing::Level`;
/// `tracing` has no `WARNING`/`CRITICAL` variants so they fold onto the
/// nearest equivalent.
pub fn parse_level(level: &str) -> Level {
    match level.to_uppercase().as_str() {
        "DEBUG" => Level::DEBUG,
        "WARNING" | "WARN" => Level::WARN,
        "ERROR" => Level::ERROR,
        "CRITICAL" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_maps_five_level_scheme() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("WARNING"), Level::WARN);
        assert_eq!(parse_level("CRITICAL"), Level::ERROR);
        assert_eq!(parse_level("unknown"), Level::INFO);
    }
}
