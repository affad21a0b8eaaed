//! Signed keyset cursors for post listings

use anyhow::{anyhow, Result};
use base64::prelude::*;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Position of the last post on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorData {
    pub published_at: i64,
    pub id: i64,
}

/// Signs and verifies `payload.signature` cursors with a process-wide key
#[derive(Clone)]
pub struct CursorSigner {
    key: Vec<u8>,
}

impl CursorSigner {
    /// Without a secret a random key is generated and cursors do not survive
    /// a restart.
    pub fn new(secret: Option<&str>) -> Self {
        let key = match secret {
            Some(s) => s.as_bytes().to_vec(),
            None => {
                let random: [u8; 32] = rand::random();
                random.to_vec()
            }
        };
        Self { key }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| anyhow!("Failed to create HMAC: {}", e))
    }

    pub fn sign(&self, data: &CursorData) -> Result<String> {
        let json = serde_json::to_string(data)?;
        let payload = BASE64_URL_SAFE_NO_PAD.encode(json.as_bytes());

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature))
    }

    pub fn verify(&self, cursor: &str) -> Result<CursorData> {
        let (payload, signature_b64) = cursor
            .split_once('.')
            .filter(|(_, sig)| !sig.contains('.'))
            .ok_or_else(|| anyhow!("Invalid cursor format"))?;

        let provided = BASE64_URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| anyhow!("Invalid cursor signature encoding"))?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let expected = mac.finalize().into_bytes();

        if !bool::from(expected.ct_eq(&provided[..])) {
            return Err(anyhow!("Cursor signature verification failed"));
        }

        let json_bytes = BASE64_URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| anyhow!("Invalid cursor payload encoding"))?;
        serde_json::from_slice(&json_bytes).map_err(|_| anyhow!("Invalid cursor data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> CursorSigner {
        CursorSigner::new(Some("test_secret_key_for_hmac_signing"))
    }

    #[test]
    fn test_cursor_sign_and_verify() {
        let data = CursorData {
            published_at: 1_700_000_000,
            id: 42,
        };
        let cursor = signer().sign(&data).unwrap();
        assert_eq!(signer().verify(&cursor).unwrap(), data);
    }

    #[test]
    fn test_cursor_tampering_detection() {
        let cursor = signer()
            .sign(&CursorData {
                published_at: 1,
                id: 2,
            })
            .unwrap();
        let (payload, _) = cursor.split_once('.').unwrap();
        assert!(signer().verify(&format!("{payload}.invalid_signature")).is_err());
    }

    #[test]
    fn test_cursor_from_other_key_rejected() {
        let cursor = CursorSigner::new(None)
            .sign(&CursorData {
                published_at: 1,
                id: 2,
            })
            .unwrap();
        assert!(signer().verify(&cursor).is_err());
    }

    #[test]
    fn test_cursor_invalid_format() {
        assert!(signer().verify("invalid").is_err());
        assert!(signer().verify("invalid.format.extra").is_err());
    }
}
