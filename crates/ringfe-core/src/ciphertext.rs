//! Key and ciphertext value types.
//!
//! All of them are plain records produced by their generator and read-only
//! afterwards. Every scheme operation validates the shapes of the objects
//! it consumes at entry, so corrupted or mismatched material fails fast
//! instead of producing garbage.

use serde::{Deserialize, Serialize};

use crate::error::{IpfeError, Result};
use crate::modulus::ModulusRepr;

/// Master secret key: one Gaussian polynomial per vector slot, in
/// coefficient representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SecretKey<M: ModulusRepr> {
    pub sk: Vec<M::Poly>,
}

impl<M: ModulusRepr> SecretKey<M> {
    pub fn validate(&self, l: usize, modulus: &M) -> Result<()> {
        if self.sk.len() != l || self.sk.iter().any(|p| !modulus.poly_shape_ok(p)) {
            return Err(IpfeError::InvalidDimensions("invalid secret key".into()));
        }
        Ok(())
    }
}

/// Master public key: the shared uniform polynomial `a` and, per slot,
/// `pk_i = a * NTT(sk_i) + NTT(e_i)`. Both components live in the NTT
/// domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PublicKey<M: ModulusRepr> {
    pub a: M::Poly,
    pub pk: Vec<M::Poly>,
}

impl<M: ModulusRepr> PublicKey<M> {
    pub fn validate(&self, l: usize, modulus: &M) -> Result<()> {
        if !modulus.poly_shape_ok(&self.a)
            || self.pk.len() != l
            || self.pk.iter().any(|p| !modulus.poly_shape_ok(p))
        {
            return Err(IpfeError::InvalidDimensions("invalid public key".into()));
        }
        Ok(())
    }
}

/// Function key for a vector y: the encoded residues of y and the
/// coefficient-domain combination sum_i y_i * sk_i.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct FunctionKey<M: ModulusRepr> {
    pub y: M::Scalars,
    pub sk_y: M::Poly,
}

impl<M: ModulusRepr> FunctionKey<M> {
    pub fn validate(&self, l: usize, modulus: &M) -> Result<()> {
        if !modulus.scalars_shape_ok(&self.y, l) || !modulus.poly_shape_ok(&self.sk_y) {
            return Err(IpfeError::InvalidDimensions("invalid function key".into()));
        }
        Ok(())
    }
}

/// Ciphertext of `rows <= n` simultaneously encrypted vectors. All
/// polynomials are in coefficient representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Ciphertext<M: ModulusRepr> {
    pub rows: usize,
    pub ct0: M::Poly,
    pub ct: Vec<M::Poly>,
}

impl<M: ModulusRepr> Ciphertext<M> {
    pub fn validate(&self, l: usize, modulus: &M) -> Result<()> {
        if self.rows == 0 || self.rows > modulus.n() {
            return Err(IpfeError::InvalidDimensions(format!(
                "ciphertext rows {} outside [1, {}]",
                self.rows,
                modulus.n()
            )));
        }
        if !modulus.poly_shape_ok(&self.ct0)
            || self.ct.len() != l
            || self.ct.iter().any(|p| !modulus.poly_shape_ok(p))
        {
            return Err(IpfeError::InvalidDimensions("invalid ciphertext".into()));
        }
        Ok(())
    }
}
