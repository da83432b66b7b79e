//! # Container Codec
//!
//! Password-based encryption of single configuration files.
//!
//! ## Legacy Container
//!
//! The default format is the salted container written by `openssl enc
//! -aes-256-cbc` and by fastlane's historical encryption helpers:
//!
//! ```text
//! base64( "Salted__" | 8-byte salt | AES-256-CBC ciphertext (PKCS#7) )
//! ```
//!
//! Key and IV come from one round of `EVP_BytesToKey` over
//! `(passphrase, salt)`. The digest is MD5 for containers produced by
//! OpenSSL 1.0.x and SHA-256 for 1.1.0c and newer. The container does not
//! record which one was used, so decryption walks
//! [`KeyDigest::FALLBACK_ORDER`] until the padding checks out.
//!
//! This derivation is weak and exists only so existing repositories keep
//! working. There is no integrity tag.
//!
//! ## V2 Container
//!
//! Opt-in with [`ContainerFormat::V2`]:
//!
//! ```text
//! base64( "APPCFGv2" | 16-byte salt | 12-byte nonce | AES-256-GCM ciphertext + tag )
//! ```
//!
//! The key is derived with Argon2id (default parameters). Decryption detects
//! the V2 magic and otherwise treats the input as a legacy container.
//!
//! ## Unit Tests
//!
//! ```bash
//! cargo test crypto::
//! ```

use crate::error::{AppConfigError, Result};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::Md5;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const KEY_SIZE: usize = 32; // AES-256
pub const IV_SIZE: usize = 16;
pub const SALT_SIZE: usize = 8;

const SALTED_MAGIC: &[u8] = b"Salted__";
const LEGACY_HEADER_SIZE: usize = 16; // magic + salt

const V2_MAGIC: &[u8] = b"APPCFGv2";
const V2_SALT_SIZE: usize = 16;
const V2_NONCE_SIZE: usize = 12;

// Matches `openssl enc -base64`, which refuses longer lines unless -A is set.
const LINE_WIDTH: usize = 64;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Digest used by the legacy key/IV derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDigest {
    Md5,
    Sha256,
}

impl KeyDigest {
    /// Order in which legacy derivations are tried.
    pub const FALLBACK_ORDER: [KeyDigest; 2] = [KeyDigest::Md5, KeyDigest::Sha256];

    fn derive(self, password: &[u8], salt: &[u8]) -> ([u8; KEY_SIZE], [u8; IV_SIZE]) {
        match self {
            KeyDigest::Md5 => bytes_to_key::<Md5>(password, salt),
            KeyDigest::Sha256 => bytes_to_key::<Sha256>(password, salt),
        }
    }
}

/// On-disk format used when encrypting.
///
/// Legacy containers are always written with the MD5 derivation. SHA-256
/// containers are read but never produced: decryption tries MD5 first, and
/// a wrong key passes the padding check often enough to return garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ContainerFormat {
    #[default]
    Legacy,
    V2,
}

impl FromStr for ContainerFormat {
    type Err = AppConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "legacy-md5" => Ok(ContainerFormat::Legacy),
            "v2" => Ok(ContainerFormat::V2),
            "legacy-sha256" => Err(AppConfigError::InvalidInput(
                "legacy-sha256 containers can be decrypted but not written (expected legacy or v2)"
                    .into(),
            )),
            other => Err(AppConfigError::InvalidInput(format!(
                "unknown container format '{other}' (expected legacy or v2)"
            ))),
        }
    }
}

impl TryFrom<String> for ContainerFormat {
    type Error = AppConfigError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::Legacy => f.write_str("legacy"),
            ContainerFormat::V2 => f.write_str("v2"),
        }
    }
}

/// A non-empty shared passphrase.
#[derive(Clone)]
pub struct Passphrase {
    secret: String,
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(**redacted**)")
    }
}

impl Passphrase {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AppConfigError::InvalidInput(
                "passphrase must not be empty".into(),
            ));
        }
        Ok(Self { secret })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    /// Encrypt into the default (legacy MD5) container
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.encrypt_with(plaintext, ContainerFormat::default())
    }

    /// Encrypt into the given container format, base64 encoded
    pub fn encrypt_with(&self, plaintext: &[u8], format: ContainerFormat) -> Result<Vec<u8>> {
        let raw = match format {
            ContainerFormat::Legacy => {
                let mut salt = [0u8; SALT_SIZE];
                OsRng.fill_bytes(&mut salt);
                seal_legacy(plaintext, self.as_bytes(), &salt, KeyDigest::Md5)?
            }
            ContainerFormat::V2 => seal_v2(plaintext, self.as_bytes())?,
        };
        Ok(encode(&raw))
    }

    /// Decrypt a container, trying both legacy digests when needed
    pub fn decrypt(&self, container: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_with_order(container, &KeyDigest::FALLBACK_ORDER)
    }

    /// Decrypt a container, trying legacy digests in the given order
    pub fn decrypt_with_order(&self, container: &[u8], order: &[KeyDigest]) -> Result<Vec<u8>> {
        let raw = decode(container)?;
        if raw.starts_with(V2_MAGIC) {
            return open_v2(&raw, self.as_bytes());
        }
        open_legacy(&raw, self.as_bytes(), order)
    }

    /// Check if data looks like one of our containers
    pub fn is_encrypted(data: &[u8]) -> bool {
        match decode(data) {
            Ok(raw) => raw.starts_with(SALTED_MAGIC) || raw.starts_with(V2_MAGIC),
            Err(_) => false,
        }
    }
}

/// Encrypt `plaintext` into a legacy container.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    Passphrase::new(password)?.encrypt(plaintext)
}

/// Decrypt a container produced by [`encrypt`] or by a legacy producer.
pub fn decrypt(container: &[u8], password: &str) -> Result<Vec<u8>> {
    Passphrase::new(password)?.decrypt(container)
}

/// `EVP_BytesToKey` with a single iteration.
fn bytes_to_key<D: Digest>(password: &[u8], salt: &[u8]) -> ([u8; KEY_SIZE], [u8; IV_SIZE]) {
    let mut material = Vec::with_capacity(KEY_SIZE + IV_SIZE + 32);
    let mut block = Vec::new();
    while material.len() < KEY_SIZE + IV_SIZE {
        let mut hasher = D::new();
        hasher.update(&block);
        hasher.update(password);
        hasher.update(salt);
        block = hasher.finalize().to_vec();
        material.extend_from_slice(&block);
    }

    let mut key = [0u8; KEY_SIZE];
    let mut iv = [0u8; IV_SIZE];
    key.copy_from_slice(&material[..KEY_SIZE]);
    iv.copy_from_slice(&material[KEY_SIZE..KEY_SIZE + IV_SIZE]);
    (key, iv)
}

fn seal_legacy(
    plaintext: &[u8],
    password: &[u8],
    salt: &[u8; SALT_SIZE],
    digest: KeyDigest,
) -> Result<Vec<u8>> {
    let (key, iv) = digest.derive(password, salt);
    let cipher = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| encryption_failed(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut result = Vec::with_capacity(LEGACY_HEADER_SIZE + ciphertext.len());
    result.extend_from_slice(SALTED_MAGIC);
    result.extend_from_slice(salt);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

fn open_legacy(raw: &[u8], password: &[u8], order: &[KeyDigest]) -> Result<Vec<u8>> {
    if raw.len() < LEGACY_HEADER_SIZE {
        return Err(malformed(format!(
            "container is {} bytes, expected at least {LEGACY_HEADER_SIZE}",
            raw.len()
        )));
    }

    // The first 8 bytes are the "Salted__" marker; they are skipped, not checked.
    let salt = &raw[SALTED_MAGIC.len()..LEGACY_HEADER_SIZE];
    let body = &raw[LEGACY_HEADER_SIZE..];

    for digest in order {
        let (key, iv) = digest.derive(password, salt);
        let cipher = match Aes256CbcDec::new_from_slices(&key, &iv) {
            Ok(cipher) => cipher,
            Err(e) => {
                debug!(?digest, error = %e, "cipher setup failed");
                continue;
            }
        };
        match cipher.decrypt_padded_vec_mut::<Pkcs7>(body) {
            Ok(plaintext) => {
                debug!(?digest, "legacy container decrypted");
                return Ok(plaintext);
            }
            Err(_) => debug!(?digest, "legacy decryption attempt failed"),
        }
    }

    Err(AppConfigError::Decryption {
        target: "input".into(),
    })
}

fn derive_v2_key(password: &[u8], salt: &[u8]) -> std::result::Result<[u8; KEY_SIZE], String> {
    let mut key = [0u8; KEY_SIZE];
    Argon2::default()
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| format!("Argon2id key derivation failed: {e}"))?;
    Ok(key)
}

fn seal_v2(plaintext: &[u8], password: &[u8]) -> Result<Vec<u8>> {
    let mut salt = [0u8; V2_SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let key = derive_v2_key(password, &salt).map_err(encryption_failed)?;

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| encryption_failed(e.to_string()))?;

    let mut nonce_bytes = [0u8; V2_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| encryption_failed(e.to_string()))?;

    let mut result =
        Vec::with_capacity(V2_MAGIC.len() + V2_SALT_SIZE + V2_NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(V2_MAGIC);
    result.extend_from_slice(&salt);
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

fn open_v2(raw: &[u8], password: &[u8]) -> Result<Vec<u8>> {
    let header = V2_MAGIC.len() + V2_SALT_SIZE + V2_NONCE_SIZE;
    if raw.len() < header {
        return Err(malformed(format!(
            "v2 container is {} bytes, expected at least {header}",
            raw.len()
        )));
    }

    let data = &raw[V2_MAGIC.len()..];
    let (salt, rest) = data.split_at(V2_SALT_SIZE);
    let (nonce_bytes, ciphertext) = rest.split_at(V2_NONCE_SIZE);

    let failed = || AppConfigError::Decryption {
        target: "input".into(),
    };
    let key = derive_v2_key(password, salt).map_err(|e| {
        debug!(error = %e, "v2 key derivation failed");
        failed()
    })?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| failed())?;
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| failed())
}

fn encode(raw: &[u8]) -> Vec<u8> {
    let text = STANDARD.encode(raw);
    let mut out = Vec::with_capacity(text.len() + text.len() / LINE_WIDTH + 1);
    for line in text.as_bytes().chunks(LINE_WIDTH) {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out
}

fn decode(container: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = container
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(&compact)
        .map_err(|e| malformed(format!("invalid base64: {e}")))
}

fn encryption_failed(reason: String) -> AppConfigError {
    AppConfigError::Encryption {
        target: "input".into(),
        reason,
    }
}

fn malformed(reason: String) -> AppConfigError {
    AppConfigError::MalformedContainer {
        target: "input".into(),
        reason,
    }
}
