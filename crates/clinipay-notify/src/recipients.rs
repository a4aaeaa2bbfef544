// crates/clinipay-notify/src/recipients.rs
// ============================================================================
// Module: Recipient Resolution
// Description: Maps a workflow event to the contacts who must hear about it.
// Purpose: Keep audience rules in one place, out of channels and templates.
// Dependencies: clinipay-core
// ============================================================================

//! ## Overview
//! Audience rules: manager-facing events (`invoice_received`,
//! `daily_digest`) go to every user with the manager role; everything else
//! concerns exactly one physician, resolved through the directory. Channel
//! eligibility is per contact: WhatsApp requires a registered number and an
//! opt-in, e-mail requires an address, and the realtime channel is always
//! eligible because it is in-process and free.

// ============================================================================
// SECTION: Imports
// ============================================================================

use clinipay_core::ChannelKind;
use clinipay_core::Contact;
use clinipay_core::NotificationEvent;
use clinipay_core::StoreError;
use clinipay_core::UserDirectory;

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves the contacts a single event must reach.
///
/// # Errors
///
/// Returns [`StoreError`] when the directory lookup fails, including
/// [`StoreError::NotFound`] for an unknown physician.
pub fn resolve(
    event: &NotificationEvent,
    directory: &dyn UserDirectory,
) -> Result<Vec<Contact>, StoreError> {
    match event {
        NotificationEvent::InvoiceReceived {
            ..
        }
        | NotificationEvent::DailyDigest {
            ..
        } => directory.managers(),
        NotificationEvent::InvoiceRequested {
            payment,
        }
        | NotificationEvent::InvoiceApproved {
            payment,
            ..
        }
        | NotificationEvent::InvoiceRejected {
            payment,
            ..
        }
        | NotificationEvent::PaymentMade {
            payment,
        }
        | NotificationEvent::AmountAdjusted {
            payment,
            ..
        }
        | NotificationEvent::ReconciliationMismatch {
            payment,
            ..
        } => Ok(vec![directory.physician_contact(payment.physician_id)?]),
    }
}

/// Returns the channel address for one contact, or `None` when ineligible.
#[must_use]
pub fn address_for(contact: &Contact, channel: ChannelKind) -> Option<String> {
    match channel {
        ChannelKind::WhatsApp => {
            if contact.opted_in {
                contact.phone.clone()
            } else {
                None
            }
        }
        ChannelKind::Email => contact.email.clone(),
        ChannelKind::Realtime => Some(contact.display_name.clone()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use clinipay_core::Amount;
    use clinipay_core::ChannelKind;
    use clinipay_core::Contact;
    use clinipay_core::InMemoryDirectory;
    use clinipay_core::NotificationEvent;
    use clinipay_core::Payment;
    use clinipay_core::PaymentId;
    use clinipay_core::PaymentStatus;
    use clinipay_core::PhysicianId;
    use clinipay_core::StoreError;

    use super::address_for;
    use super::resolve;

    fn payment(physician: u64) -> Payment {
        Payment {
            id: PaymentId::from_raw(1).unwrap(),
            physician_id: PhysicianId::from_raw(physician).unwrap(),
            competence: "2026-08".parse().unwrap(),
            gross_amount: Amount::parse("1000.00").unwrap(),
            net_amount: None,
            status: PaymentStatus::Solicited,
            solicited_at: None,
            responded_at: None,
            paid_at: None,
        }
    }

    fn contact(name: &str, phone: Option<&str>, email: Option<&str>, opted_in: bool) -> Contact {
        Contact {
            display_name: name.to_string(),
            phone: phone.map(str::to_string),
            email: email.map(str::to_string),
            opted_in,
        }
    }

    #[test]
    fn physician_events_resolve_to_one_contact() {
        let mut directory = InMemoryDirectory::new();
        directory.add_manager(contact("Manager", Some("5531911112222"), None, true));
        directory.add_physician(
            PhysicianId::from_raw(7).unwrap(),
            contact("Dr. Souza", Some("5531988887777"), None, true),
        );

        let event = NotificationEvent::InvoiceRequested {
            payment: payment(7),
        };
        let contacts = resolve(&event, &directory).unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].display_name, "Dr. Souza");
    }

    #[test]
    fn unknown_physician_is_a_not_found_error() {
        let directory = InMemoryDirectory::new();
        let event = NotificationEvent::PaymentMade {
            payment: payment(99),
        };
        let err = resolve(&event, &directory).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "got {err:?}");
    }

    #[test]
    fn opted_out_contacts_are_ineligible_for_whatsapp_only() {
        let c = contact("Manager", Some("5531911112222"), Some("m@example.com"), false);
        assert_eq!(address_for(&c, ChannelKind::WhatsApp), None);
        assert_eq!(address_for(&c, ChannelKind::Email), Some("m@example.com".to_string()));
        assert_eq!(address_for(&c, ChannelKind::Realtime), Some("Manager".to_string()));
    }
}
