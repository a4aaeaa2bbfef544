// crates/clinipay-notify/src/dispatcher.rs
// ============================================================================
// Module: Fan-Out Dispatcher
// Description: Worker-pool delivery of one event to N (recipient, channel) pairs.
// Purpose: Isolate delivery failures and keep callers non-blocking.
// Dependencies: crate::{channel, recipients, templates}, clinipay-core, std
// ============================================================================

//! ## Overview
//! One `dispatch` call renders the event once, fetches any attachment once,
//! and enqueues one job per eligible (recipient, channel) pair onto a
//! bounded queue drained by a fixed pool of worker threads. Every job runs
//! in isolation: a provider failure produces one failed [`DeliveryResult`]
//! and one attempt-log record and touches nothing else. The returned
//! [`DispatchTicket`] is dropped by production callers; tests and the digest
//! job use it to wait for the full fan-out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::thread::JoinHandle;

use clinipay_core::ChannelKind;
use clinipay_core::DeliveryOutcome;
use clinipay_core::DeliveryResult;
use clinipay_core::DispatchTicket;
use clinipay_core::Dispatcher;
use clinipay_core::NotificationAttempt;
use clinipay_core::NotificationEvent;
use clinipay_core::PaymentId;
use clinipay_core::SharedAttemptLog;
use clinipay_core::SharedFileStorage;
use clinipay_core::SharedUserDirectory;
use clinipay_core::Timestamp;
use thiserror::Error;

use crate::channel::AttachmentPayload;
use crate::channel::OutboundMessage;
use crate::channel::SharedChannel;
use crate::recipients;
use crate::templates;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Maximum provider response length kept in results and attempt logs.
const MAX_RESPONSE_LOG: usize = 512;

/// Tuning and addressing parameters for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of delivery worker threads.
    pub workers: usize,
    /// Bounded job queue capacity.
    pub queue_capacity: usize,
    /// Public base URL used for action links.
    pub public_base_url: String,
    /// Lifetime of signed download URLs, in seconds.
    pub url_ttl_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
            public_base_url: "http://127.0.0.1:8843".to_string(),
            url_ttl_secs: 3_600,
        }
    }
}

/// Errors raised while constructing the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A worker thread could not be spawned.
    #[error("failed to spawn delivery worker: {0}")]
    Spawn(String),
    /// The configuration is unusable.
    #[error("invalid dispatcher configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Delivery Jobs
// ============================================================================

/// One delivery to one address through one channel.
struct DeliveryJob {
    /// Channel to deliver through.
    channel: SharedChannel,
    /// Fully-addressed message.
    message: OutboundMessage,
    /// Payment the event concerned, for the attempt log.
    payment_id: Option<PaymentId>,
    /// Dispatch timestamp, stamped onto the attempt record.
    now: Timestamp,
    /// Per-dispatch result channel.
    results: mpsc::Sender<DeliveryResult>,
}

/// Truncates a provider response for logging.
fn truncate_response(response: &str) -> String {
    if response.len() <= MAX_RESPONSE_LOG {
        response.to_string()
    } else {
        response.chars().take(MAX_RESPONSE_LOG).collect()
    }
}

/// Executes one job: deliver, log the attempt, report the result.
fn execute_job(job: &DeliveryJob, attempts: &SharedAttemptLog) {
    let outcome = match job.channel.deliver(&job.message) {
        Ok(response) => DeliveryOutcome::Delivered {
            provider_response: truncate_response(&response),
        },
        Err(err) => DeliveryOutcome::Failed {
            error: err.to_string(),
        },
    };
    let (success, provider_response) = match &outcome {
        DeliveryOutcome::Delivered {
            provider_response,
        } => (true, provider_response.clone()),
        DeliveryOutcome::Failed {
            error,
        } => (false, error.clone()),
    };
    let attempt = NotificationAttempt {
        event: job.message.event.clone(),
        channel: job.channel.kind(),
        recipient: job.message.recipient.clone(),
        address: job.message.address.clone(),
        success,
        provider_response,
        payment_id: job.payment_id,
        sent_at: job.now,
    };
    // The log is best-effort audit data; a log failure must not fail the
    // delivery it describes.
    drop(attempts.record(&attempt));
    drop(job.results.send(DeliveryResult {
        event: job.message.event.clone(),
        channel: job.channel.kind(),
        recipient: job.message.recipient.clone(),
        address: job.message.address.clone(),
        outcome,
    }));
}

/// Worker loop: drain jobs until the queue closes.
fn run_worker(queue: &Arc<Mutex<mpsc::Receiver<DeliveryJob>>>, attempts: &SharedAttemptLog) {
    loop {
        let job = {
            let Ok(guard) = queue.lock() else {
                return;
            };
            guard.recv()
        };
        match job {
            Ok(job) => execute_job(&job, attempts),
            Err(_) => return,
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Worker-pool dispatcher fanning one event out to all its deliveries.
pub struct FanoutDispatcher {
    /// Tuning and addressing parameters.
    config: DispatcherConfig,
    /// Configured outbound channels.
    channels: Vec<SharedChannel>,
    /// Recipient directory.
    directory: SharedUserDirectory,
    /// Document storage for attachment fetch and signed URLs.
    storage: SharedFileStorage,
    /// Write-only attempt log.
    attempts: SharedAttemptLog,
    /// Job queue feeding the workers; `None` once shutdown begins.
    sender: Option<mpsc::SyncSender<DeliveryJob>>,
    /// Worker thread handles, joined on drop.
    workers: Vec<JoinHandle<()>>,
}

impl FanoutDispatcher {
    /// Starts the worker pool and returns the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the configuration is unusable or a
    /// worker thread cannot be spawned.
    pub fn new(
        config: DispatcherConfig,
        channels: Vec<SharedChannel>,
        directory: SharedUserDirectory,
        storage: SharedFileStorage,
        attempts: SharedAttemptLog,
    ) -> Result<Self, DispatchError> {
        if config.workers == 0 {
            return Err(DispatchError::Invalid("workers must be positive".to_string()));
        }
        if config.queue_capacity == 0 {
            return Err(DispatchError::Invalid("queue_capacity must be positive".to_string()));
        }
        let (sender, receiver) = mpsc::sync_channel(config.queue_capacity);
        let queue = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(config.workers);
        for n in 0 .. config.workers {
            let queue = Arc::clone(&queue);
            let attempts = Arc::clone(&attempts);
            let handle = thread::Builder::new()
                .name(format!("clinipay-notify-{n}"))
                .spawn(move || run_worker(&queue, &attempts))
                .map_err(|err| DispatchError::Spawn(err.to_string()))?;
            workers.push(handle);
        }
        Ok(Self {
            config,
            channels,
            directory,
            storage,
            attempts,
            sender: Some(sender),
            workers,
        })
    }

    /// Fetches the event's document once, shared across all recipients.
    ///
    /// Fetch failures degrade to a text-only dispatch rather than blocking
    /// the notification.
    fn fetch_attachment(&self, event: &NotificationEvent) -> Option<Arc<AttachmentPayload>> {
        let NotificationEvent::InvoiceReceived {
            invoice,
            ..
        } = event
        else {
            return None;
        };
        let bytes = self.storage.download(&invoice.file_ref).ok()?;
        let signed_url = self.storage.signed_url(&invoice.file_ref, self.config.url_ttl_secs).ok();
        Some(Arc::new(AttachmentPayload {
            filename: invoice.original_filename.clone(),
            bytes,
            signed_url,
        }))
    }

    /// Records a dispatch-level failure that produced no delivery jobs.
    fn record_dispatch_failure(&self, event: &NotificationEvent, now: Timestamp, error: &str) {
        let attempt = NotificationAttempt {
            event: event.label().to_string(),
            channel: ChannelKind::Realtime,
            recipient: String::new(),
            address: String::new(),
            success: false,
            provider_response: error.to_string(),
            payment_id: event.payment_id(),
            sent_at: now,
        };
        drop(self.attempts.record(&attempt));
    }
}

impl Dispatcher for FanoutDispatcher {
    fn dispatch(&self, event: NotificationEvent, now: Timestamp) -> DispatchTicket {
        let (results_tx, results_rx) = mpsc::channel();
        let contacts = match recipients::resolve(&event, self.directory.as_ref()) {
            Ok(contacts) => contacts,
            Err(err) => {
                self.record_dispatch_failure(
                    &event,
                    now,
                    &format!("recipient resolution failed: {err}"),
                );
                return DispatchTicket::new(0, results_rx);
            }
        };
        let rendered = templates::render(&event, &self.config.public_base_url);
        let attachment = self.fetch_attachment(&event);

        let mut submitted = 0_usize;
        for contact in &contacts {
            for channel in &self.channels {
                let Some(address) = recipients::address_for(contact, channel.kind()) else {
                    continue;
                };
                let job = DeliveryJob {
                    channel: Arc::clone(channel),
                    message: OutboundMessage {
                        event: event.label().to_string(),
                        recipient: contact.display_name.clone(),
                        address,
                        subject: rendered.subject.clone(),
                        text: rendered.text.clone(),
                        html: rendered.html.clone(),
                        attachment: attachment.clone(),
                    },
                    payment_id: event.payment_id(),
                    now,
                    results: results_tx.clone(),
                };
                match self.sender.as_ref() {
                    Some(sender) => {
                        if let Err(mpsc::SendError(job)) = sender.send(job) {
                            execute_job(&job, &self.attempts);
                        }
                    }
                    // Shutdown already began; deliver inline so the ticket
                    // still accounts for every pair.
                    None => execute_job(&job, &self.attempts),
                }
                submitted = submitted.saturating_add(1);
            }
        }
        DispatchTicket::new(submitted, results_rx)
    }
}

impl Drop for FanoutDispatcher {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop; join so in-flight
        // deliveries finish before the dispatcher disappears.
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            drop(handle.join());
        }
    }
}
