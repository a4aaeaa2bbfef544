// crates/clinipay-providers/tests/http_providers_unit.rs
// ============================================================================
// Module: HTTP Provider Unit Tests
// Description: Loopback-server tests for the OCR, messaging, and mail clients.
// Purpose: Verify auth headers, error classification, size caps, and timeouts.
// ============================================================================

//! ## Overview
//! Each test stands up a `tiny_http` loopback server and drives one provider
//! against it. Covered: bearer authentication on the wire, OCR response
//! parsing and degradation, 4xx/5xx classification, the response size cap,
//! and read-timeout mapping.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use clinipay_config::EmailConfig;
use clinipay_config::EndpointConfig;
use clinipay_config::OcrConfig;
use clinipay_core::Amount;
use clinipay_core::EmailAttachment;
use clinipay_core::EmailRelay;
use clinipay_core::Messenger;
use clinipay_core::OcrProvider;
use clinipay_core::ProviderError;
use clinipay_providers::HttpEmailRelay;
use clinipay_providers::HttpMessenger;
use clinipay_providers::HttpOcrProvider;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

struct CapturedRequest {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
}

/// Serves one request with a fixed response, capturing what arrived.
fn one_shot_server(
    status: u16,
    body: &'static str,
) -> (String, mpsc::Receiver<CapturedRequest>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let base = format!("http://{}", server.server_addr());
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        if let Ok(mut request) = server.recv() {
            let mut captured_body = String::new();
            drop(std::io::Read::read_to_string(request.as_reader(), &mut captured_body));
            let captured = CapturedRequest {
                method: request.method().to_string(),
                path: request.url().to_string(),
                authorization: request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("authorization"))
                    .map(|header| header.value.to_string()),
                body: captured_body,
            };
            drop(tx.send(captured));
            drop(request.respond(Response::from_string(body).with_status_code(status)));
        }
    });
    (base, rx, handle)
}

fn endpoint(url: String, timeout_ms: u64) -> EndpointConfig {
    EndpointConfig {
        url,
        api_key: "key-123".to_string(),
        timeout_ms,
    }
}

// ============================================================================
// SECTION: OCR Provider
// ============================================================================

#[test]
fn ocr_sends_bearer_auth_and_parses_the_response() {
    let (base, rx, handle) = one_shot_server(
        200,
        r#"{"invoice_number":"NF-42","gross_amount":"1000,00","net_amount":"935.50"}"#,
    );
    let provider = HttpOcrProvider::new(&OcrConfig {
        endpoint: endpoint(format!("{base}/extract"), 5_000),
        max_response_bytes: 65_536,
    })
    .unwrap();

    let outcome = provider.extract(b"%PDF-1.7 test").unwrap();
    handle.join().unwrap();

    assert!(outcome.processed);
    assert_eq!(outcome.invoice_number.as_deref(), Some("NF-42"));
    assert_eq!(outcome.gross_amount, Some(Amount::parse("1000.00").unwrap()));
    assert_eq!(outcome.net_amount, Some(Amount::parse("935.50").unwrap()));

    let captured = rx.recv().unwrap();
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.authorization.as_deref(), Some("Bearer key-123"));
    assert!(captured.body.contains("document_base64"), "{}", captured.body);
}

#[test]
fn ocr_rejects_bodies_over_the_size_cap() {
    let (base, _rx, handle) = one_shot_server(200, "{\"invoice_number\":\"NF-1\"}");
    let provider = HttpOcrProvider::new(&OcrConfig {
        endpoint: endpoint(format!("{base}/extract"), 5_000),
        max_response_bytes: 4,
    })
    .unwrap();

    let err = provider.extract(b"%PDF").unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, ProviderError::Invalid(_)), "got {err:?}");
}

#[test]
fn ocr_maps_server_errors_to_unavailable() {
    let (base, _rx, handle) = one_shot_server(503, "maintenance");
    let provider = HttpOcrProvider::new(&OcrConfig {
        endpoint: endpoint(format!("{base}/extract"), 5_000),
        max_response_bytes: 65_536,
    })
    .unwrap();

    let err = provider.extract(b"%PDF").unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, ProviderError::Unavailable(_)), "got {err:?}");
}

// ============================================================================
// SECTION: Messenger
// ============================================================================

#[test]
fn messenger_posts_text_to_the_text_route() {
    let (base, rx, handle) = one_shot_server(200, "accepted:msg-1");
    let messenger = HttpMessenger::new(&endpoint(base, 5_000)).unwrap();

    let response = messenger.send_text("5531988887777", "Please submit your invoice.").unwrap();
    handle.join().unwrap();
    assert_eq!(response, "accepted:msg-1");

    let captured = rx.recv().unwrap();
    assert_eq!(captured.path, "/messages/text");
    assert!(captured.body.contains("5531988887777"), "{}", captured.body);
}

#[test]
fn messenger_maps_client_errors_to_rejected() {
    let (base, rx, handle) = one_shot_server(422, "unsupported media");
    let messenger = HttpMessenger::new(&endpoint(base, 5_000)).unwrap();

    let err = messenger.send_media("5531988887777", b"%PDF", "caption", "nf.pdf").unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, ProviderError::Rejected(_)), "got {err:?}");
    assert_eq!(rx.recv().unwrap().path, "/messages/media");
}

#[test]
fn messenger_maps_read_timeouts_to_timeout() {
    let server = Server::http("127.0.0.1:0").unwrap();
    let base = format!("http://{}", server.server_addr());
    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            // Hold the request past the client timeout before responding.
            thread::sleep(Duration::from_millis(400));
            drop(request.respond(Response::from_string("late")));
        }
    });

    let messenger = HttpMessenger::new(&endpoint(base, 100)).unwrap();
    let err = messenger.send_text("5531988887777", "hello").unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, ProviderError::Timeout), "got {err:?}");
}

// ============================================================================
// SECTION: E-mail Relay
// ============================================================================

#[test]
fn relay_sends_from_address_and_inline_attachments() {
    let (base, rx, handle) = one_shot_server(200, "queued:mail-9");
    let relay = HttpEmailRelay::new(&EmailConfig {
        endpoint: endpoint(base, 5_000),
        from_address: "finance@example.com".to_string(),
    })
    .unwrap();

    let response = relay
        .send(
            &["ana@example.com".to_string()],
            "Invoice received",
            "<p>Review the attached invoice.</p>",
            &[EmailAttachment {
                filename: "nf.pdf".to_string(),
                bytes: b"%PDF-1.7".to_vec(),
            }],
        )
        .unwrap();
    handle.join().unwrap();
    assert_eq!(response, "queued:mail-9");

    let captured = rx.recv().unwrap();
    assert!(captured.body.contains("finance@example.com"), "{}", captured.body);
    assert!(captured.body.contains("nf.pdf"), "{}", captured.body);
    assert!(captured.body.contains("content_base64"), "{}", captured.body);
}

#[test]
fn relay_refuses_an_empty_recipient_list() {
    let relay = HttpEmailRelay::new(&EmailConfig {
        endpoint: endpoint("http://127.0.0.1:9/never".to_string(), 100),
        from_address: "finance@example.com".to_string(),
    })
    .unwrap();
    let err = relay.send(&[], "subject", "<p>body</p>", &[]).unwrap_err();
    assert!(matches!(err, ProviderError::Invalid(_)), "got {err:?}");
}
