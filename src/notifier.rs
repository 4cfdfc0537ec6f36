//! Notification dispatch
//!
//! The alert policy only produces [`NotificationRequest`]s. Notifiers take
//! them from there, and must never block the frame loop: the
//! [`BackgroundNotifier`] hands requests to a worker thread through a bounded
//! queue and forgets about them.

use crate::error::MonitorError;
use crate::types::NotificationRequest;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Accepts notification requests without blocking the caller
pub trait Notifier: Send {
    fn notify(&self, request: NotificationRequest);
}

/// Delivers one request to its destination; may block
pub trait Transport: Send {
    fn deliver(&mut self, request: &NotificationRequest) -> Result<(), MonitorError>;
}

impl<F> Transport for F
where
    F: FnMut(&NotificationRequest) -> Result<(), MonitorError> + Send,
{
    fn deliver(&mut self, request: &NotificationRequest) -> Result<(), MonitorError> {
        self(request)
    }
}

/// Runs a [`Transport`] on a dedicated worker thread
pub struct BackgroundNotifier {
    sender: Option<SyncSender<NotificationRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundNotifier {
    /// Start the worker. At most `queue_capacity` requests wait for delivery;
    /// requests beyond that are dropped.
    pub fn spawn<T>(mut transport: T, queue_capacity: usize) -> Result<Self, MonitorError>
    where
        T: Transport + 'static,
    {
        let (sender, receiver) = sync_channel::<NotificationRequest>(queue_capacity.max(1));
        let worker = thread::Builder::new()
            .name("congestion-notifier".to_string())
            .spawn(move || {
                for request in receiver {
                    match transport.deliver(&request) {
                        Ok(()) => info!(id = %request.id, "notification delivered"),
                        Err(e) => warn!(id = %request.id, error = %e, "notification failed"),
                    }
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

impl Notifier for BackgroundNotifier {
    fn notify(&self, request: NotificationRequest) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(request)) => {
                warn!(id = %request.id, "notifier queue full, dropping notification")
            }
            Err(TrySendError::Disconnected(request)) => {
                warn!(id = %request.id, "notifier worker gone, dropping notification")
            }
        }
    }
}

impl Drop for BackgroundNotifier {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue drains
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("notifier worker panicked");
            }
        }
    }
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    destination: Option<String>,
}

impl LogNotifier {
    pub fn new(destination: Option<String>) -> Self {
        Self { destination }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, request: NotificationRequest) {
        info!(
            destination = self.destination.as_deref().unwrap_or("-"),
            subject = %request.subject(),
            "{}",
            request.body()
        );
    }
}

/// Keeps every request in memory; clones share the same list
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    requests: Arc<Mutex<Vec<NotificationRequest>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<NotificationRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.requests().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, request: NotificationRequest) {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }
    }
}

/// Appends each request as one JSON line to a file
pub struct JsonLinesTransport {
    writer: BufWriter<File>,
}

impl JsonLinesTransport {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl Transport for JsonLinesTransport {
    fn deliver(&mut self, request: &NotificationRequest) -> Result<(), MonitorError> {
        serde_json::to_writer(&mut self.writer, request)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
