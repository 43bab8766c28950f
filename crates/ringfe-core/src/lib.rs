//! ringfe-core: inner-product functional encryption from ring-LWE.
//!
//! The engine derives *function keys* for public integer vectors y; a
//! ciphertext encrypting a vector or matrix x then reveals exactly the
//! per-row inner products <x_row, y>. Operation set:
//! - parameter search (correctness bound + primal-attack estimate)
//! - master secret / public key generation
//! - function key derivation
//! - single-vector and multi-row encryption under shared randomness
//! - functional decryption and full recovery
//!
//! Two interchangeable modulus backends sit behind [`ModulusRepr`]: an RNS
//! chain of 32-bit primes (the performance path) and a single
//! arbitrary-precision prime. The engine is purely computational and
//! single-threaded; every randomized operation takes a caller-supplied
//! CSPRNG, and instances are freely shareable across threads once built.

pub mod bigring;
pub mod ciphertext;
pub mod error;
pub mod modulus;
pub mod ntt;
pub mod params;
pub mod rns;
pub mod sampling;
pub mod scheme;
pub mod serialize;

pub use ciphertext::{Ciphertext, FunctionKey, PublicKey, SecretKey};
pub use error::{IpfeError, Result};
pub use modulus::{BigModPrime, BigModulus, ChainModulus, ModPrime, ModulusRepr};
pub use params::IpfeParams;
pub use sampling::GaussianSampler;
pub use scheme::RlweIpfe;
