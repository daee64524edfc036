//! Crypto Collaborator
//!
//! Per-node key material and the opaque sign/verify/encrypt/decrypt operations
//! consumed by publication and inspection. Every failure surfaces as a `bool`
//! or `Option`; nothing here is fatal to the caller.
//!
//! Keys are drawn from the simulation RNG, so a seeded world always produces
//! the same identities.

use bevy_ecs::prelude::*;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use mesh_events::{MessageId, NodeId};
use rand::RngCore;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

/// Placeholder anonymity proof. Any other value fails verification.
pub const ANONYMITY_PROOF: &str = "SIMULATED_ZKP_V1_VALID";

/// Domain label mixed into every derived shared key
const SHARED_KEY_LABEL: &[u8] = b"mesh-sim/logistics/v1";

/// Component: a node's signing and key-agreement keys
#[derive(Component, Clone)]
pub struct NodeKeys {
    signing: SigningKey,
    exchange: StaticSecret,
}

impl NodeKeys {
    pub fn from_rng<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let signing = SigningKey::from_bytes(&seed);
        rng.fill_bytes(&mut seed);
        let exchange = StaticSecret::from(seed);
        Self { signing, exchange }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// First 16 hex characters of the signing public key.
    pub fn public_key_id(&self) -> String {
        hex::encode(&self.verifying_key().as_bytes()[..8])
    }

    pub fn exchange_public(&self) -> PublicKey {
        PublicKey::from(&self.exchange)
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(message).to_bytes().to_vec()
    }

    /// Symmetric key shared with the owner of `peer`.
    pub fn shared_secret(&self, peer: &PublicKey) -> [u8; 32] {
        let dh = self.exchange.diffie_hellman(peer);
        let mut hasher = Sha256::new();
        hasher.update(SHARED_KEY_LABEL);
        hasher.update(dh.as_bytes());
        hasher.finalize().into()
    }
}

/// Check an Ed25519 signature. Malformed signatures are simply invalid.
pub fn verify(public: &VerifyingKey, message: &[u8], signature: &[u8]) -> bool {
    match Signature::from_slice(signature) {
        Ok(sig) => public.verify(message, &sig).is_ok(),
        Err(_) => false,
    }
}

/// Authenticated encryption under `key` with a fresh nonce.
pub fn encrypt<R: RngCore + ?Sized>(
    key: &[u8; 32],
    plaintext: &[u8],
    rng: &mut R,
) -> Option<(Vec<u8>, [u8; 12])> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut nonce = [0u8; 12];
    rng.fill_bytes(&mut nonce);
    let ciphertext = cipher.encrypt(Nonce::from_slice(&nonce), plaintext).ok()?;
    Some((ciphertext, nonce))
}

/// `None` on a wrong key, tampered ciphertext or wrong nonce.
pub fn decrypt(key: &[u8; 32], ciphertext: &[u8], nonce: &[u8; 12]) -> Option<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
}

/// Lowercase hex SHA-256.
pub fn hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Id shared by every copy of a message.
pub fn message_id(publisher: NodeId, text: &str, timestamp_ms: u64, nonce: u64) -> MessageId {
    let data = format!("{}:{}:{}:{}", publisher, text, timestamp_ms, nonce);
    MessageId(hash(data.as_bytes()))
}

pub fn generate_anonymity_proof() -> String {
    ANONYMITY_PROOF.to_string()
}

pub fn verify_anonymity_proof(proof: &str) -> bool {
    proof == ANONYMITY_PROOF
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn keys(seed: u64) -> NodeKeys {
        NodeKeys::from_rng(&mut SmallRng::seed_from_u64(seed))
    }

    #[test]
    fn test_sign_and_verify() {
        let alice = keys(1);
        let sig = alice.sign(b"need water");
        assert!(verify(&alice.verifying_key(), b"need water", &sig));
        assert!(!verify(&alice.verifying_key(), b"need water [TAMPERED]", &sig));
        assert!(!verify(&keys(2).verifying_key(), b"need water", &sig));
        assert!(!verify(&alice.verifying_key(), b"need water", &[0u8; 10]));
    }

    #[test]
    fn test_shared_secret_is_symmetric() {
        let a = keys(1);
        let b = keys(2);
        assert_eq!(
            a.shared_secret(&b.exchange_public()),
            b.shared_secret(&a.exchange_public())
        );
        assert_ne!(
            a.shared_secret(&b.exchange_public()),
            a.shared_secret(&keys(3).exchange_public())
        );
    }

    #[test]
    fn test_encrypt_decrypt() {
        let mut rng = SmallRng::seed_from_u64(9);
        let key = keys(1).shared_secret(&keys(2).exchange_public());
        let (ciphertext, nonce) = encrypt(&key, b"3 pallets at dock B", &mut rng).unwrap();
        assert_eq!(
            decrypt(&key, &ciphertext, &nonce).as_deref(),
            Some(&b"3 pallets at dock B"[..])
        );

        let other = keys(1).shared_secret(&keys(3).exchange_public());
        assert!(decrypt(&other, &ciphertext, &nonce).is_none());

        let mut tampered = ciphertext.clone();
        tampered[0] ^= 0xff;
        assert!(decrypt(&key, &tampered, &nonce).is_none());
    }

    #[test]
    fn test_seeded_keys_are_reproducible() {
        assert_eq!(keys(5).verifying_key(), keys(5).verifying_key());
        assert_ne!(keys(5).verifying_key(), keys(6).verifying_key());
        assert_eq!(keys(5).public_key_id(), keys(5).public_key_id());
        assert_eq!(keys(5).public_key_id().len(), 16);
    }

    #[test]
    fn test_message_id_and_hash() {
        let a = message_id(NodeId(1), "hi", 0, 7);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a, message_id(NodeId(1), "hi", 0, 7));
        assert_ne!(a, message_id(NodeId(1), "hi", 0, 8));
        assert_eq!(
            hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_anonymity_proof() {
        assert!(verify_anonymity_proof(&generate_anonymity_proof()));
        assert!(!verify_anonymity_proof("forged"));
    }
}
