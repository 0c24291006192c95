use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::RelayError;

type HmacSha256 = Hmac<Sha256>;

/// base64(HMAC-SHA256(channel secret, raw body)), as sent in `X-Line-Signature`.
#[cfg(test)]
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes()).unwrap();
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Constant-time check of the header value against the raw body.
pub fn verify(channel_secret: &str, body: &[u8], signature: Option<&str>) -> Result<(), RelayError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(RelayError::InvalidSignature)?;
    let expected = STANDARD
        .decode(signature)
        .map_err(|_| RelayError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| RelayError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| RelayError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"destination":"U0","events":[]}"#;

    #[test]
    fn signature_round_trips() {
        let signature = sign("secret", BODY);
        assert!(verify("secret", BODY, Some(&signature)).is_ok());
    }

    #[test]
    fn known_vector_matches() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let signature = sign("key", b"The quick brown fox jumps over the lazy dog");
        assert_eq!(signature, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }

    #[test]
    fn rejects_wrong_secret_or_tampered_body() {
        let signature = sign("secret", BODY);
        assert!(matches!(
            verify("other", BODY, Some(&signature)),
            Err(RelayError::InvalidSignature)
        ));
        assert!(matches!(
            verify("secret", br#"{"destination":"U1","events":[]}"#, Some(&signature)),
            Err(RelayError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_missing_blank_or_non_base64_header() {
        for header in [None, Some(""), Some("   "), Some("%%% not base64 %%%")] {
            assert!(matches!(
                verify("secret", BODY, header),
                Err(RelayError::InvalidSignature)
            ));
        }
    }
}
