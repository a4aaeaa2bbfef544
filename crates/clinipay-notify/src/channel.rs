// crates/clinipay-notify/src/channel.rs
// ============================================================================
// Module: Notification Channels
// Description: Channel trait and the WhatsApp, e-mail, and realtime channels.
// Purpose: Deliver one rendered message to one address with channel quirks.
// Dependencies: clinipay-core, std
// ============================================================================

//! ## Overview
//! A [`NotificationChannel`] delivers one [`OutboundMessage`] to one address
//! and reports the raw provider response. Channels own their quirks: the
//! WhatsApp channel tries media first and falls back to text with a signed
//! download link when the provider rejects the media; the realtime channel
//! is purely in-process and never fails on an absent subscriber.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;

use clinipay_core::ChannelKind;
use clinipay_core::EmailAttachment;
use clinipay_core::ProviderError;
use clinipay_core::SharedEmailRelay;
use clinipay_core::SharedMessenger;

// ============================================================================
// SECTION: Outbound Message
// ============================================================================

/// Document payload shared across every recipient of one dispatch.
///
/// # Invariants
/// - Bytes are fetched from storage once per dispatch, never per recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    /// Attachment filename.
    pub filename: String,
    /// Attachment bytes.
    pub bytes: Vec<u8>,
    /// Temporary signed download URL, when storage produced one.
    pub signed_url: Option<String>,
}

/// One rendered message addressed to one recipient.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Event label the message carries.
    pub event: String,
    /// Recipient display name.
    pub recipient: String,
    /// Channel-specific target address.
    pub address: String,
    /// Subject line for channels that have one.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// HTML body for channels that render it.
    pub html: String,
    /// Shared attachment payload, when the event carries a document.
    pub attachment: Option<Arc<AttachmentPayload>>,
}

// ============================================================================
// SECTION: Channel Trait
// ============================================================================

/// One outbound delivery mechanism.
///
/// # Invariants
/// - `deliver` is synchronous and bounded by the underlying provider timeout.
/// - A failure affects only the one delivery; the dispatcher isolates it.
pub trait NotificationChannel: Send + Sync {
    /// Returns the channel kind for logging and result records.
    fn kind(&self) -> ChannelKind;

    /// Delivers the message, returning the raw provider response.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the provider call fails or times out.
    fn deliver(&self, message: &OutboundMessage) -> Result<String, ProviderError>;
}

/// Shared channel handle.
pub type SharedChannel = Arc<dyn NotificationChannel>;

// ============================================================================
// SECTION: WhatsApp Channel
// ============================================================================

/// WhatsApp delivery: media first, text with a signed link on rejection.
pub struct WhatsAppChannel {
    /// Underlying messaging provider.
    messenger: SharedMessenger,
}

impl WhatsAppChannel {
    /// Creates a WhatsApp channel over the messenger provider.
    #[must_use]
    pub fn new(messenger: SharedMessenger) -> Self {
        Self {
            messenger,
        }
    }
}

impl NotificationChannel for WhatsAppChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::WhatsApp
    }

    fn deliver(&self, message: &OutboundMessage) -> Result<String, ProviderError> {
        let Some(attachment) = message.attachment.as_deref() else {
            return self.messenger.send_text(&message.address, &message.text);
        };
        match self.messenger.send_media(
            &message.address,
            &attachment.bytes,
            &message.text,
            &attachment.filename,
        ) {
            Ok(response) => Ok(response),
            // The provider refused the media itself; the message still goes
            // out as text with a signed download link when one exists.
            Err(ProviderError::Rejected(_) | ProviderError::Invalid(_)) => {
                let body = match attachment.signed_url.as_deref() {
                    Some(url) => format!("{}\n\nDocument: {url}", message.text),
                    None => message.text.clone(),
                };
                self.messenger.send_text(&message.address, &body)
            }
            Err(other) => Err(other),
        }
    }
}

// ============================================================================
// SECTION: E-mail Channel
// ============================================================================

/// Transactional e-mail delivery with inline attachments.
pub struct EmailChannel {
    /// Underlying e-mail relay.
    relay: SharedEmailRelay,
}

impl EmailChannel {
    /// Creates an e-mail channel over the relay provider.
    #[must_use]
    pub fn new(relay: SharedEmailRelay) -> Self {
        Self {
            relay,
        }
    }
}

impl NotificationChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn deliver(&self, message: &OutboundMessage) -> Result<String, ProviderError> {
        let attachments: Vec<EmailAttachment> = message
            .attachment
            .as_deref()
            .map(|payload| {
                vec![EmailAttachment {
                    filename: payload.filename.clone(),
                    bytes: payload.bytes.clone(),
                }]
            })
            .unwrap_or_default();
        self.relay.send(
            &[message.address.clone()],
            &message.subject,
            &message.html,
            &attachments,
        )
    }
}

// ============================================================================
// SECTION: Realtime Channel
// ============================================================================

/// Lightweight in-app notice pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeNotice {
    /// Event label being announced.
    pub event: String,
    /// Subject line of the notice.
    pub subject: String,
    /// Plain-text body of the notice.
    pub body: String,
}

/// In-process realtime delivery keyed by subscriber address.
///
/// # Invariants
/// - An absent or disconnected subscriber is not a delivery failure; the
///   recipient is simply offline.
#[derive(Default)]
pub struct RealtimeChannel {
    /// Live subscribers by address.
    subscribers: Mutex<HashMap<String, mpsc::Sender<RealtimeNotice>>>,
}

impl RealtimeChannel {
    /// Creates a realtime channel with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber, replacing any previous one for the address.
    pub fn subscribe(&self, address: &str) -> mpsc::Receiver<RealtimeNotice> {
        let (sender, receiver) = mpsc::channel();
        if let Ok(mut guard) = self.subscribers.lock() {
            guard.insert(address.to_string(), sender);
        }
        receiver
    }
}

impl NotificationChannel for RealtimeChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Realtime
    }

    fn deliver(&self, message: &OutboundMessage) -> Result<String, ProviderError> {
        let mut guard = self
            .subscribers
            .lock()
            .map_err(|_| ProviderError::Unavailable("subscriber table poisoned".to_string()))?;
        let Some(subscriber) = guard.get(&message.address) else {
            return Ok("offline".to_string());
        };
        let notice = RealtimeNotice {
            event: message.event.clone(),
            subject: message.subject.clone(),
            body: message.text.clone(),
        };
        if subscriber.send(notice).is_err() {
            guard.remove(&message.address);
            return Ok("disconnected".to_string());
        }
        Ok("pushed".to_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
