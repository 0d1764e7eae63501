//! API-key hashing contract (§6): `key_hash = hex(HMAC_SHA256(salt, raw_key))`,
//! with constant-time comparison at verification time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hash a raw API key with the configured pepper (`APIKEY_HASH_SALT`).
///
/// # Panics
///
/// Never panics: `Hmac::new_from_slice` accepts keys of any length.
pub fn hash_api_key(raw_key: &str, salt: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(raw_key.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of two hex-encoded hashes.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_and_salt_produce_same_hash() {
        let h1 = hash_api_key("raw-key-1", "salt");
        let h2 = hash_api_key("raw-key-1", "salt");
        assert_eq!(h1, h2);
        assert!(constant_time_eq(&h1, &h2));
    }

    #[test]
    fn different_keys_produce_different_hashes() {
        let h1 = hash_api_key("raw-key-1", "salt");
        let h2 = hash_api_key("raw-key-2", "salt");
        assert_ne!(h1, h2);
        assert!(!constant_time_eq(&h1, &h2));
    }

    #[test]
    fn different_salt_changes_hash() {
        let h1 = hash_api_key("raw-key-1", "salt-a");
        let h2 = hash_api_key("raw-key-1", "salt-b");
        assert_ne!(h1, h2);
    }
}
