//! Passphrase-based encryption of exported secrets.
//!
//! This module provides:
//! - `Encrypter` - Derives a key once per export and seals payloads
//! - `Decrypter` - Opens payloads, caching derived keys per salt
//! - `EnvelopeError` - Failures from either side

mod envelope;

pub use envelope::{DEFAULT_KDF_ITERATIONS, Decrypter, Encrypter, EnvelopeError};
