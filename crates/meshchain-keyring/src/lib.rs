//! Ed25519 key loading and block-header signing (component C2).
//!
//! The private key is loaded once at boot and held in memory for the life of
//! the process; [`Keyring::zeroize`] is called during the C8 shutdown
//! sequence.

use std::path::Path;

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use meshchain_types::Hash32;

mod pem;

#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    #[error("failed to read key file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("malformed PEM key material in {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("signature does not verify")]
    InvalidSignature
}

/// Holds this node's Ed25519 signing key and exposes sign/verify over block
/// header hashes only — it never signs arbitrary bytes, keeping the
/// signature surface identical to the `verify(signer, signature, hash)`
/// invariant every block must satisfy.
pub struct Keyring {
    node_identity: String,
    signing_key:   Option<SigningKey>
}

impl Keyring {
    /// Loads a PEM-encoded Ed25519 private key from `path`. `node_identity`
    /// is the subject recorded in `Block.signer`.
    pub fn load(path: impl AsRef<Path>, node_identity: impl Into<String>) -> Result<Self, KeyringError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.display().to_string();
        let contents = std::fs::read_to_string(path_ref)
            .map_err(|source| KeyringError::Io { path: path_str.clone(), source })?;

        let seed = pem::decode_ed25519_seed(&contents)
            .map_err(|reason| KeyringError::Malformed { path: path_str.clone(), reason })?;

        let signing_key = SigningKey::from_bytes(&seed);
        Ok(Self { node_identity: node_identity.into(), signing_key: Some(signing_key) })
    }

    /// Builds a keyring around an already-generated key; used by tests and
    /// by `testing-tools` to spin up a multi-node cluster without key files.
    pub fn from_signing_key(signing_key: SigningKey, node_identity: impl Into<String>) -> Self {
        Self { node_identity: node_identity.into(), signing_key: Some(signing_key) }
    }

    pub fn generate(node_identity: impl Into<String>) -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self::from_signing_key(SigningKey::generate(&mut csprng), node_identity)
    }

    pub fn node_identity(&self) -> &str {
        &self.node_identity
    }

    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.require_key().verifying_key().to_bytes())
    }

    /// Signs a block header hash. Returns the signature as lowercase hex,
    /// matching `Block.signature`'s wire representation.
    pub fn sign(&self, hash: Hash32) -> String {
        let sig: Signature = self.require_key().sign(&hash.0);
        hex::encode(sig.to_bytes())
    }

    fn require_key(&self) -> &SigningKey {
        self.signing_key
            .as_ref()
            .expect("keyring used after zeroize")
    }

    /// Drops and zeroes the private key material. After this call, `sign`
    /// panics — callers must not sign after shutdown has begun.
    /// `SigningKey` is built with the `zeroize` feature, so dropping it here
    /// scrubs the key bytes rather than just releasing the allocation.
    pub fn zeroize(&mut self) {
        self.signing_key.take();
    }
}

impl Drop for Keyring {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Verifies a block signature against a known signer's public key, encoded
/// as hex (as produced by [`Keyring::verifying_key_hex`]).
pub fn verify(signer_public_key_hex: &str, signature_hex: &str, hash: Hash32) -> Result<(), KeyringError> {
    let pk_bytes =
        hex::decode(signer_public_key_hex).map_err(|_| KeyringError::InvalidSignature)?;
    let pk_arr: [u8; 32] = pk_bytes.try_into().map_err(|_| KeyringError::InvalidSignature)?;
    let verifying_key =
        VerifyingKey::from_bytes(&pk_arr).map_err(|_| KeyringError::InvalidSignature)?;

    let sig_bytes = hex::decode(signature_hex).map_err(|_| KeyringError::InvalidSignature)?;
    let sig_arr: [u8; 64] = sig_bytes.try_into().map_err(|_| KeyringError::InvalidSignature)?;
    let signature = Signature::from_bytes(&sig_arr);

    verifying_key
        .verify(&hash.0, &signature)
        .map_err(|_| KeyringError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let keyring = Keyring::generate("node-a");
        let hash = Hash32([7u8; 32]);
        let sig = keyring.sign(hash);
        assert!(verify(&keyring.verifying_key_hex(), &sig, hash).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_hash() {
        let keyring = Keyring::generate("node-a");
        let hash = Hash32([7u8; 32]);
        let sig = keyring.sign(hash);
        let other_hash = Hash32([8u8; 32]);
        assert!(verify(&keyring.verifying_key_hex(), &sig, other_hash).is_err());
    }

    #[test]
    fn load_from_pem_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.key");
        let seed = [42u8; 32];
        std::fs::write(&path, pem::encode_ed25519_seed(&seed)).unwrap();

        let keyring = Keyring::load(&path, "node-a").unwrap();
        let hash = Hash32([1u8; 32]);
        let sig = keyring.sign(hash);
        assert!(verify(&keyring.verifying_key_hex(), &sig, hash).is_ok());
    }
}
