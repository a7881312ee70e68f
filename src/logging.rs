//! Async rotating file logger: a bounded-queue worker writing
//! through a hybrid size/time rotating sink, wired in as an additional
//! `tracing_subscriber::Layer` alongside a console `fmt` layer.
//! See `main.rs` for how the two are combined.
pub mod layer;
pub mod rotation;
pub mod worker;

use std::io;

pub use layer::{parse_level, AsyncFileLayer};
pub use rotation::RotationPolicy;
pub use worker::LogWorkerHandle;

const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_BACKUP_COUNT: usize = 14;

/// Builds the rotating file sink, spawns its worker, and returns the
/// `Layer` to add to the `tracing_subscriber` registry.
pub fn init_file_layer(log_path: &str, level: &str, retention_days: u32) -> io::Result<AsyncFileLayer> {
    let sink = rotation::RotatingSink::new(
        log_path,
        DEFAULT_MAX_BYTES,
        RotationPolicy::Daily,
        DEFAULT_BACKUP_COUNT,
        retention_days,
    )?;
    let worker = worker::spawn(sink);
    Ok(AsyncFileLayer::new(worker, parse_level(level)))
}
