//! Error type shared by every fallible operation of the engine.

use thiserror::Error;

/// Errors surfaced by parameter generation, key handling, and the
/// encryption/decryption operations. All of them are fatal to the calling
/// operation; nothing is retried internally.
#[derive(Error, Debug)]
pub enum IpfeError {
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("value {value} outside the declared bound ±{bound}")]
    InvalidBound { value: i64, bound: i64 },

    #[error("invalid modulus prime: {0}")]
    InvalidModulusPrime(String),

    #[error("parameter search exhausted: no safe configuration below n = 2^20")]
    ParameterSearchExhausted,

    #[error("decrypted value does not fit the plaintext width")]
    DecryptionOutOfRange,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IpfeError>;
