use campaigns_core::{ChangesetEvent, Result};
use campaigns_store::EventStore;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a code host's `sha256=<hex>`-style webhook signature against the
/// configured secret. Uses `Hmac::verify_slice`, which compares in constant
/// time, so this is safe to call directly on attacker-controlled input.
pub fn verify_signature(secret: &[u8], body: &[u8], signature_header: &str) -> bool {
    let Some(hex_digest) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Persists a batch of events parsed from a webhook payload. Idempotent:
/// replaying the same payload upserts the same `(changeset_id, kind, key)`
/// rows rather than duplicating them, per the event-upsert idempotence
/// property.
pub async fn absorb_events(events: &EventStore, batch: Vec<ChangesetEvent>) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    events.upsert_many(&batch).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        let bytes = mac.finalize().into_bytes();
        format!("sha256={}", bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let secret = b"top-secret";
        let body = b"{\"action\":\"closed\"}";
        let signature = sign(secret, body);
        assert!(verify_signature(secret, body, &signature));
    }

    #[test]
    fn rejects_a_payload_signed_with_the_wrong_secret() {
        let body = b"{\"action\":\"closed\"}";
        let signature = sign(b"top-secret", body);
        assert!(!verify_signature(b"wrong-secret", body, &signature));
    }

    #[test]
    fn rejects_a_malformed_header() {
        assert!(!verify_signature(b"top-secret", b"{}", "not-a-signature"));
        assert!(!verify_signature(b"top-secret", b"{}", "sha256=zz"));
    }
}
