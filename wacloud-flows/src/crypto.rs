//! Hybrid encryption of the data-exchange envelope.
//!
//! The peer generates a fresh AES key per exchange, wraps it with the
//! business public key (RSA-OAEP, SHA-256) and encrypts the payload with
//! AES-GCM under a 16-byte IV. The authentication tag is appended to the
//! ciphertext. The reply is sealed with the same key under the bitwise
//! complement of the request IV.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit, OsRng};
use aes_gcm::aes::{Aes128, Aes256};
use aes_gcm::{AesGcm, Nonce, Tag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::rand_core::CryptoRngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::FlowError;

pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

type Aes128Gcm16 = AesGcm<Aes128, U16>;
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// The request envelope as received over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRequest {
    pub encrypted_flow_data: String,
    pub encrypted_aes_key: String,
    pub initial_vector: String,
}

/// Plaintext and key material of one exchange.
///
/// Lives only for the duration of the exchange.
pub struct DecryptedRequest {
    pub body: Vec<u8>,
    pub aes_key: Vec<u8>,
    pub iv: [u8; IV_LEN],
}

impl std::fmt::Debug for DecryptedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedRequest")
            .field("body", &format_args!("<{} bytes>", self.body.len()))
            .field("aes_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

enum Cipher {
    Aes128(Aes128Gcm16),
    Aes256(Aes256Gcm16),
}

impl Cipher {
    fn new(key: &[u8]) -> Result<Self, FlowError> {
        let cipher = match key.len() {
            16 => Aes128Gcm16::new_from_slice(key).map(Cipher::Aes128),
            32 => Aes256Gcm16::new_from_slice(key).map(Cipher::Aes256),
            n => return Err(FlowError::KeyLength(n)),
        };
        cipher.map_err(|_| FlowError::KeyLength(key.len()))
    }

    fn open(&self, iv: &[u8; IV_LEN], buffer: &mut [u8], tag: &Tag) -> Result<(), FlowError> {
        let nonce = Nonce::<U16>::from_slice(iv);
        match self {
            Cipher::Aes128(c) => c.decrypt_in_place_detached(nonce, b"", buffer, tag),
            Cipher::Aes256(c) => c.decrypt_in_place_detached(nonce, b"", buffer, tag),
        }
        .map_err(|_| FlowError::BodyDecrypt)
    }

    fn seal(&self, iv: &[u8; IV_LEN], buffer: &mut [u8]) -> Result<Tag, FlowError> {
        let nonce = Nonce::<U16>::from_slice(iv);
        match self {
            Cipher::Aes128(c) => c.encrypt_in_place_detached(nonce, b"", buffer),
            Cipher::Aes256(c) => c.encrypt_in_place_detached(nonce, b"", buffer),
        }
        .map_err(|_| FlowError::BodyEncrypt)
    }
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, FlowError> {
    STANDARD
        .decode(value)
        .map_err(|source| FlowError::Base64 { field, source })
}

fn to_iv(bytes: &[u8]) -> Result<[u8; IV_LEN], FlowError> {
    bytes.try_into().map_err(|_| FlowError::IvLength(bytes.len()))
}

/// The response IV: every bit of the request IV inverted.
pub fn flip_iv(iv: &[u8; IV_LEN]) -> [u8; IV_LEN] {
    iv.map(|b| b ^ 0xFF)
}

/// Decrypt `data` (ciphertext followed by the 16-byte tag).
///
/// Nothing is returned unless the tag verifies.
pub fn open(key: &[u8], iv: &[u8; IV_LEN], mut data: Vec<u8>) -> Result<Vec<u8>, FlowError> {
    let cipher = Cipher::new(key)?;
    let Some(split) = data.len().checked_sub(TAG_LEN) else {
        return Err(FlowError::BodyDecrypt);
    };
    let tag = Tag::clone_from_slice(&data[split..]);
    data.truncate(split);
    cipher.open(iv, &mut data, &tag)?;
    Ok(data)
}

/// Encrypt `plaintext`, returning the ciphertext with the tag appended.
pub fn seal(key: &[u8], iv: &[u8; IV_LEN], mut plaintext: Vec<u8>) -> Result<Vec<u8>, FlowError> {
    let tag = Cipher::new(key)?.seal(iv, &mut plaintext)?;
    plaintext.extend_from_slice(&tag);
    Ok(plaintext)
}

/// Unwrap the symmetric key and decrypt the request body.
///
/// The RSA operation is blinded with the OS RNG.
pub fn decrypt_request(
    request: &EncryptedRequest,
    private_key: &RsaPrivateKey,
) -> Result<DecryptedRequest, FlowError> {
    decrypt_request_with_rng(&mut OsRng, request, private_key)
}

/// [`decrypt_request`] with a caller-supplied blinding RNG.
pub fn decrypt_request_with_rng<R: CryptoRngCore>(
    rng: &mut R,
    request: &EncryptedRequest,
    private_key: &RsaPrivateKey,
) -> Result<DecryptedRequest, FlowError> {
    let wrapped = decode_field("encrypted_aes_key", &request.encrypted_aes_key)?;
    let aes_key = private_key
        .decrypt_blinded(rng, Oaep::new::<Sha256>(), &wrapped)
        .map_err(FlowError::KeyUnwrap)?;
    let iv = to_iv(&decode_field("initial_vector", &request.initial_vector)?)?;
    let data = decode_field("encrypted_flow_data", &request.encrypted_flow_data)?;
    let body = open(&aes_key, &iv, data)?;
    Ok(DecryptedRequest { body, aes_key, iv })
}

/// Serialize and seal the reply under the flipped IV, base64-encoded.
pub fn encrypt_response<T: Serialize>(
    response: &T,
    aes_key: &[u8],
    iv: &[u8; IV_LEN],
) -> Result<String, FlowError> {
    let plaintext = serde_json::to_vec(response).map_err(FlowError::Serialize)?;
    let sealed = seal(aes_key, &flip_iv(iv), plaintext)?;
    Ok(STANDARD.encode(sealed))
}

/// Build a request envelope the way the peer does.
pub fn encrypt_request<T, R>(
    rng: &mut R,
    public_key: &RsaPublicKey,
    aes_key: &[u8],
    iv: &[u8; IV_LEN],
    payload: &T,
) -> Result<EncryptedRequest, FlowError>
where
    T: Serialize,
    R: CryptoRngCore,
{
    let plaintext = serde_json::to_vec(payload).map_err(FlowError::Serialize)?;
    let wrapped = public_key
        .encrypt(rng, Oaep::new::<Sha256>(), aes_key)
        .map_err(FlowError::KeyUnwrap)?;
    Ok(EncryptedRequest {
        encrypted_flow_data: STANDARD.encode(seal(aes_key, iv, plaintext)?),
        encrypted_aes_key: STANDARD.encode(wrapped),
        initial_vector: STANDARD.encode(iv),
    })
}

/// Decrypt a base64 reply the way the peer does.
pub fn decrypt_response(encoded: &str, aes_key: &[u8], iv: &[u8; IV_LEN]) -> Result<Vec<u8>, FlowError> {
    let data = decode_field("response", encoded)?;
    open(aes_key, &flip_iv(iv), data)
}
