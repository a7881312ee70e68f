//! Bounded-queue background worker: producers enqueue
//! non-blocking, one task drains and writes to the rotating sink.
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::rotation::RotatingSink;

const QUEUE_CAPACITY: usize = 1_000;
const BATCH_SIZE: usize = 50;
const BATCH_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LogRecord {
    pub line: String,
}

/// Cloneable producer handle; the receiving half lives only inside the
/// spawned worker task.
#[derive(Clone)]
pub struct LogWorkerHandle {
    sender: mpsc::Sender<LogRecord>,
}

impl LogWorkerHandle {
    /// Never blocks. A full queue or a dead worker both fall back to
    /// stderr rather than stalling the caller.
    pub fn try_send(&self, record: LogRecord) {
        if let Err(err) = self.sender.try_send(record) {
            match err {
                mpsc::error::TrySendError::Full(rec) => {
                    eprintln!("[logger] queue full, dropping record: {}", rec.line);
                }
                mpsc::error::TrySendError::Closed(rec) => {
                    eprintln!("[logger] worker gone, dropping record: {}", rec.line);
                }
            }
        }
    }
}

/// Spawns the drain loop and hands back a handle to enqueue onto it.
/// `sink` is moved onto the task; it is never touched from any other
/// thread.
pub fn spawn(mut sink: RotatingSink) -> LogWorkerHandle {
    let (sender, mut receiver) = mpsc::channel(QUEUE_CAPACITY);

    tokio::spawn(async move {
        let mut batch = Vec::with_capacity(BATCH_SIZE);
        let mut last_flush = Instant::now();

        loop {
            tokio::select! {
                maybe_record = receiver.recv() => {
                    match maybe_record {
                        Some(record) => batch.push(record),
                        None => break,
                    }
                }
                _ = tokio::time::sleep(BATCH_INTERVAL) => {}
            }

            let due = batch.len() >= BATCH_SIZE
                || (!batch.is_empty() && last_flush.elapsed() >= BATCH_INTERVAL);
            if due {
                flush(&mut sink, &mut batch);
                last_flush = Instant::now();
            }
        }

        drain_on_shutdown(&mut receiver, &mut batch);
        flush(&mut sink, &mut batch);
    });

    LogWorkerHandle { sender }
}

fn drain_on_shutdown(receiver: &mut mpsc::Receiver<LogRecord>, batch: &mut Vec<LogRecord>) {
    let deadline = Instant::now() + SHUTDOWN_DRAIN_TIMEOUT;
    while Instant::now() < deadline {
        match receiver.try_recv() {
            Ok(record) => batch.push(record),
            Err(_) => break,
        }
    }
}

fn flush(sink: &mut RotatingSink, batch: &mut Vec<LogRecord>) {
    for record in batch.drain(..) {
        if let Err(e) = sink.write_line(&record.line) {
            eprintln!("[logger] failed to write record, dropping: {e}");
        }
    }
}
