//! Decodes password fields stored as ciphertext under `password_encryption =
//! true`. The key material lives at `config/<env>.key`, a raw byte file
//! never committed alongside the TOML bundle itself.
//!
//! No AEAD crate is otherwise needed in this workspace, so this is a simple
//! SHA-256 counter-mode keystream: deterministic, reversible, good enough to
//! keep passwords out of the config file in plaintext without pulling in a
//! new dependency for one narrow need. Not a substitute for a vetted
//! AEAD in a system that needs real confidentiality.

use sha2::{Digest, Sha256};

fn keystream(key: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut counter: u64 = 0;
    while out.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(key);
        hasher.update(counter.to_be_bytes());
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(len);
    out
}

fn xor_with_keystream(data: &[u8], key: &[u8]) -> Vec<u8> {
    let stream = keystream(key, data.len());
    data.iter().zip(stream.iter()).map(|(b, k)| b ^ k).collect()
}

/// Encrypts `plaintext` under `key`, returning lowercase hex ciphertext
/// suitable for a TOML string field.
pub fn encrypt(plaintext: &str, key: &[u8]) -> String {
    hex::encode(xor_with_keystream(plaintext.as_bytes(), key))
}

/// Decrypts hex ciphertext produced by [`encrypt`] back to plaintext.
pub fn decrypt(ciphertext_hex: &str, key: &[u8]) -> Result<String, CipherError> {
    let bytes = hex::decode(ciphertext_hex).map_err(|_| CipherError::Malformed)?;
    let plain = xor_with_keystream(&bytes, key);
    String::from_utf8(plain).map_err(|_| CipherError::Malformed)
}

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("ciphertext is not valid hex or does not decode to utf8")]
    Malformed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encrypt_and_decrypt() {
        let key = b"0123456789abcdef0123456789abcdef";
        let ct = encrypt("hunter2", key);
        assert_eq!(decrypt(&ct, key).unwrap(), "hunter2");
    }

    #[test]
    fn wrong_key_does_not_round_trip() {
        let ct = encrypt("hunter2", b"key-a-key-a-key-a-key-a-key-a-ab");
        let decoded = decrypt(&ct, b"key-b-key-b-key-b-key-b-key-b-ab");
        assert!(decoded.map(|s| s != "hunter2").unwrap_or(true));
    }
}
