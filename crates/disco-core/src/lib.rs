//! # Disco Core
//!
//! Cryptographic primitives shared by every Disco component.
//!
//! This crate contains no I/O and no storage. It is pure computation over keys,
//! ciphertexts and certificates.
//!
//! ## Key Types
//!
//! - [`SymmetricKey`] - A 256-bit key; the node root key and everything derived from it
//! - [`X25519PublicKey`] / [`X25519StaticSecret`] - Key agreement halves
//! - [`SharedKey`] - The output of a Diffie-Hellman exchange
//! - [`IssuedCertificate`] - A PEM certificate and its PKCS#8 private key
//!
//! ## Sealing
//!
//! Values are sealed in 16 KiB chunks with XChaCha20-Poly1305. See the [`cipher`]
//! module for the frame layout.

pub mod cert;
pub mod cipher;
pub mod crypto;
pub mod encoding;
pub mod error;

pub use cert::{issue_certificate, IssuedCertificate, Issuer};
pub use cipher::{
    decrypt_asymmetric, decrypt_symmetric, decrypt_symmetric_cancellable, encrypt_asymmetric,
    encrypt_symmetric, encrypt_symmetric_cancellable, CHUNK_SIZE,
};
pub use crypto::{diffie_hellman, hash, SharedKey, SymmetricKey, X25519PublicKey, X25519StaticSecret};
pub use encoding::{decode, decode_key, encode, encode_key};
pub use error::{CoreError, Result};
