//! Webhook security tests
//!
//! Exercise the signature scheme the webhook endpoint relies on: the
//! `t=<ts>,v1=<hmac>` header format, HMAC correctness, the freshness
//! window, and constant-time comparison.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

const FRESHNESS_WINDOW_SECS: i64 = 300;

/// Compute the signature header the processor would send
fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap());

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("t={timestamp},v1={signature}")
}

/// A minimal subscription event envelope
fn subscription_payload(event_type: &str) -> Vec<u8> {
    let payload = serde_json::json!({
        "id": "evt_test_1",
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "sub_test_1",
                "customer": "cus_test_1",
                "status": "active",
                "cancel_at_period_end": false,
                "current_period_end": Utc::now().timestamp() + 30 * 24 * 60 * 60,
                "items": { "data": [{ "price": { "id": "price_test" } }] },
            }
        }
    });
    serde_json::to_vec(&payload).unwrap()
}

/// Parse the header into its components, as the verifier does
fn parse_signature_header(header: &str) -> (Option<&str>, Option<&str>) {
    let mut timestamp = None;
    let mut sig_v1 = None;
    for part in header.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            match key {
                "t" => timestamp = Some(value),
                "v1" => sig_v1 = Some(value),
                _ => {}
            }
        }
    }
    (timestamp, sig_v1)
}

#[test]
fn signature_header_round_trips() {
    let payload = subscription_payload("customer.subscription.updated");
    let timestamp = Utc::now().timestamp();
    let header = sign_payload(&payload, "whsec_test", timestamp);

    let (ts, v1) = parse_signature_header(&header);
    assert_eq!(ts.unwrap().parse::<i64>().unwrap(), timestamp);
    assert_eq!(v1.unwrap().len(), 64); // hex-encoded SHA-256
}

#[test]
fn different_secrets_yield_different_signatures() {
    let payload = subscription_payload("invoice.payment_succeeded");
    let timestamp = Utc::now().timestamp();

    let a = sign_payload(&payload, "whsec_a", timestamp);
    let b = sign_payload(&payload, "whsec_b", timestamp);
    assert_ne!(a, b);
}

#[test]
fn tampering_with_the_payload_changes_the_signature() {
    let timestamp = Utc::now().timestamp();
    let original = subscription_payload("customer.subscription.deleted");
    let mut tampered = original.clone();
    let len = tampered.len();
    tampered[len - 3] ^= 1;

    assert_ne!(
        sign_payload(&original, "whsec_test", timestamp),
        sign_payload(&tampered, "whsec_test", timestamp)
    );
}

#[test]
fn freshness_window_rejects_replays() {
    let now = Utc::now().timestamp();

    // Within the window
    assert!((now - (now - 60)).abs() <= FRESHNESS_WINDOW_SECS);

    // A replayed signature from 10 minutes ago
    assert!((now - (now - 600)).abs() > FRESHNESS_WINDOW_SECS);

    // A signature from the future is equally suspect
    assert!((now - (now + 600)).abs() > FRESHNESS_WINDOW_SECS);
}

#[test]
fn malformed_headers_are_missing_components() {
    for header in ["", "v1=abc", "t=123", "garbage", "t=1;v1=2"] {
        let (ts, v1) = parse_signature_header(header);
        assert!(ts.is_none() || v1.is_none(), "header {header:?} parsed");
    }
}

#[test]
fn comparison_is_length_and_content_sensitive() {
    fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
    }

    assert!(constant_time_eq(b"deadbeef", b"deadbeef"));
    assert!(!constant_time_eq(b"deadbeef", b"deadbeee"));
    assert!(!constant_time_eq(b"dead", b"deadbeef"));
    assert!(constant_time_eq(b"", b""));
}
