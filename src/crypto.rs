//! The `Crypto` capability (§6) — an external collaborator the core
//! consumes but never implements protocol logic on top of.
//!
//! The core itself calls exactly one of these methods: [`Crypto::fingerprint`],
//! used for logging and for comparing "sender ≟ known client" (§3). Signing
//! is used only when this relay produces its own `server_hello` (§4.5).
//! Everything else here (encryption, decryption) exists because a concrete
//! implementation of the capability needs it to be useful to clients, not
//! because the relay calls it — matching `original_source/security/security_module.py`'s
//! RSA-2048 / OAEP / PSS / AES-256-GCM scheme one for one.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::RngCore;
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Digest;

use crate::codec::IdentityKey;
use crate::error::RelayError;

pub const RSA_KEY_BITS: usize = 2048;
const AES_KEY_LEN: usize = 32;
const GCM_NONCE_LEN: usize = 12;

/// A generated or loaded RSA keypair, PEM-encoded for persistence.
pub struct Keypair {
    pub public_pem: String,
    pub private_pem: String,
}

/// The capability the relay core depends on. A trait (rather than a
/// concrete struct) so the relay can be tested with a deterministic fake
/// and so an alternate primitive (e.g. Ed25519) could be swapped in without
/// touching `router.rs` or `registry.rs`.
pub trait Crypto: Send + Sync {
    /// Generates a fresh keypair, PEM-encoded.
    fn generate_keypair(&self) -> Result<Keypair, RelayError>;

    /// Parses a PEM public key, validating it's well-formed. Returns the
    /// normalized `IdentityKey` so the caller has a canonical byte string.
    fn load_public_key(&self, pem: &str) -> Result<IdentityKey, RelayError>;

    /// Signs `message` with the PEM-encoded private key, returning a
    /// base64-encoded PSS/SHA-256 signature.
    fn sign(&self, message: &[u8], private_key_pem: &str) -> Result<String, RelayError>;

    /// `base64(sha256(identity_key_bytes))` — the stable handle used for
    /// sender attribution and logging (§3).
    fn fingerprint(&self, identity_key: &IdentityKey) -> String;
}

/// The default `Crypto` implementation: RSA-2048 with OAEP for asymmetric
/// encryption, PSS/SHA-256 for signatures, and AES-256-GCM for the
/// symmetric layer clients use to actually encrypt chat payloads.
#[derive(Default)]
pub struct RsaCrypto;

impl Crypto for RsaCrypto {
    fn generate_keypair(&self) -> Result<Keypair, RelayError> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| RelayError::Fatal(format!("failed to generate RSA keypair: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| RelayError::Fatal(format!("failed to encode private key: {e}")))?
            .to_string();
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| RelayError::Fatal(format!("failed to encode public key: {e}")))?;

        Ok(Keypair { public_pem, private_pem })
    }

    fn load_public_key(&self, pem: &str) -> Result<IdentityKey, RelayError> {
        RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| RelayError::Malformed(format!("invalid public key PEM: {e}")))?;
        Ok(IdentityKey(pem.to_string()))
    }

    fn sign(&self, message: &[u8], private_key_pem: &str) -> Result<String, RelayError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| RelayError::Fatal(format!("invalid private key PEM: {e}")))?;
        let signing_key = SigningKey::<Sha256>::new(private_key);
        let mut rng = rand::rngs::OsRng;
        let signature: Signature = signing_key.sign_with_rng(&mut rng, message);
        Ok(BASE64.encode(signature.to_bytes()))
    }

    fn fingerprint(&self, identity_key: &IdentityKey) -> String {
        fingerprint_bytes(identity_key.to_string().as_bytes())
    }
}

/// `base64(sha256(bytes))`, matching `Encryption.generate_fingerprint` in
/// `original_source/security/security_module.py`.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    BASE64.encode(digest)
}

/// Verifies a PSS/SHA-256 signature against a base64-encoded signature and a
/// PEM public key. Not called by the relay core (§9: signature verification
/// is an extension point), but available to anyone composing this crate as
/// a library, and exercised by the round-trip tests below.
pub fn verify(message: &[u8], signature_b64: &str, public_key_pem: &str) -> Result<(), RelayError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| RelayError::Malformed(format!("invalid public key PEM: {e}")))?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    let raw = BASE64
        .decode(signature_b64)
        .map_err(|e| RelayError::Malformed(format!("invalid base64 signature: {e}")))?;
    let signature = Signature::try_from(raw.as_slice())
        .map_err(|e| RelayError::Malformed(format!("invalid signature bytes: {e}")))?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| RelayError::Malformed("signature does not verify".into()))
}

/// Encrypts `plaintext` with RSA-OAEP/SHA-256 under a recipient's public
/// key. Used by clients to wrap the AES session key they embed in a `chat`
/// frame's `symm_keys`; the relay never calls this.
pub fn encrypt_rsa(plaintext: &[u8], public_key_pem: &str) -> Result<Vec<u8>, RelayError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| RelayError::Malformed(format!("invalid public key PEM: {e}")))?;
    let mut rng = rand::rngs::OsRng;
    public_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|e| RelayError::Malformed(format!("RSA-OAEP encryption failed: {e}")))
}

/// Decrypts an RSA-OAEP ciphertext under a private key.
pub fn decrypt_rsa(ciphertext: &[u8], private_key_pem: &str) -> Result<Vec<u8>, RelayError> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| RelayError::Fatal(format!("invalid private key PEM: {e}")))?;
    private_key
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|e| RelayError::Malformed(format!("RSA-OAEP decryption failed: {e}")))
}

/// Generates a random 256-bit AES key and a 96-bit GCM nonce — the pair a
/// client embeds (RSA-wrapped) per recipient in a `chat` frame's `iv` /
/// `symm_keys`.
pub fn generate_aes_key_and_nonce() -> ([u8; AES_KEY_LEN], [u8; GCM_NONCE_LEN]) {
    let mut rng = rand::rngs::OsRng;
    let mut key = [0u8; AES_KEY_LEN];
    let mut nonce = [0u8; GCM_NONCE_LEN];
    rng.fill_bytes(&mut key);
    rng.fill_bytes(&mut nonce);
    (key, nonce)
}

/// Encrypts `plaintext` with AES-256-GCM. The relay never calls this — it's
/// the symmetric primitive a client uses for the actual chat body.
pub fn encrypt_aes_gcm(plaintext: &[u8], key: &[u8; AES_KEY_LEN], nonce: &[u8; GCM_NONCE_LEN]) -> Result<Vec<u8>, RelayError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| RelayError::Malformed(format!("AES-GCM encryption failed: {e}")))
}

/// Decrypts an AES-256-GCM ciphertext (tag appended, as `aes-gcm` expects).
pub fn decrypt_aes_gcm(ciphertext: &[u8], key: &[u8; AES_KEY_LEN], nonce: &[u8; GCM_NONCE_LEN]) -> Result<Vec<u8>, RelayError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| RelayError::Malformed(format!("AES-GCM decryption failed: {e}")))
}
