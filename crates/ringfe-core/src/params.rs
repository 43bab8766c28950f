//! Scheme parameters and the joint parameter search.
//!
//! `generate` walks ring dimensions n = 2^exp upward until a modulus that
//! satisfies the correctness (noise-growth) bound also survives the primal
//! lattice attack estimate. Everything needed to rebuild the modulus
//! tables is stored; the tables themselves are transient.

use std::f64::consts::{E, PI};
use std::fmt;

use num_bigint::BigUint;
use num_traits::{FromPrimitive, One, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{IpfeError, Result};
use crate::modulus::ModulusRepr;

const SQRT_2: f64 = std::f64::consts::SQRT_2;

/// Parameters of one scheme instance over modulus representation `M`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct IpfeParams<M: ModulusRepr> {
    /// Length of the data vectors (columns of the matrix x).
    pub l: usize,
    /// log2 of the ring dimension.
    pub exp: u32,
    /// Ring dimension; also the maximum number of encrypted rows.
    pub n: usize,
    /// Bound on the maximum norm of x entries.
    pub bx: i64,
    /// Bound on the maximum norm of y entries.
    pub by: i64,
    /// Plaintext modulus K = 2 * l * bx * by + 1.
    pub k: BigUint,
    /// Prime material; the modulus tables are rebuilt from this.
    pub primes: M::Primes,
    /// Std-dev for master key generation.
    pub sigma1: f64,
    /// Std-dev for encryption randomness.
    pub sigma2: f64,
    /// Std-dev for per-slot encryption noise.
    pub sigma3: f64,
}

impl<M: ModulusRepr> IpfeParams<M> {
    /// Search for parameters meeting both the correctness bound and the
    /// primal-attack safety predicate.
    ///
    /// `sec` is the security parameter, `l` the vector length, `n_rows`
    /// the number of matrix rows to support, and `bx`/`by` the plaintext
    /// bounds. Fails with [`IpfeError::ParameterSearchExhausted`] if no
    /// ring dimension below 2^20 is safe.
    pub fn generate(sec: u32, l: usize, n_rows: usize, bx: i64, by: i64) -> Result<Self> {
        if sec == 0 || l == 0 || n_rows == 0 {
            return Err(IpfeError::InvalidDimensions(
                "sec, l, and n must be positive".into(),
            ));
        }
        if bx < 1 {
            return Err(IpfeError::InvalidBound { value: bx, bound: 1 });
        }
        if by < 1 {
            return Err(IpfeError::InvalidBound { value: by, bound: 1 });
        }
        let k = BigUint::from(2u32)
            * BigUint::from(l)
            * BigUint::from(bx as u64)
            * BigUint::from(by as u64)
            + BigUint::one();
        let sec_sqrt = (sec as f64).sqrt();
        let sigma = 1.0f64;
        let sigma1 = 2.0 * (l as f64).sqrt() * bx as f64 * sigma;
        let b_bound = (sec as f64 / 0.265) as usize;
        let margin = M::q_min_margin(l as u64, by as u64);

        let start = ceil_log2(n_rows).max(6);
        for exp in start..20 {
            let n = 1usize << exp;
            let sigma2 = SQRT_2 * ((l + 2) as f64).sqrt() * n as f64 * sigma1 * sec_sqrt * sigma;
            let sigma3 = sigma2 * SQRT_2;

            let bound = 2.0 * n as f64 * sec as f64 * sigma1 * sigma2 + sec_sqrt * sigma3;
            let q_min = (BigUint::from_f64(bound).ok_or(IpfeError::ParameterSearchExhausted)?
                << 1u32)
                * &margin
                * &k;
            let (primes, q) = M::find_primes(exp, &q_min)?;

            if primal_secure(n, sigma, b_bound, &q) {
                return Ok(Self {
                    l,
                    exp,
                    n,
                    bx,
                    by,
                    k,
                    primes,
                    sigma1,
                    sigma2,
                    sigma3,
                });
            }
        }
        Err(IpfeError::ParameterSearchExhausted)
    }

    /// Rebuild the modulus tables this parameter set describes.
    pub fn modulus(&self) -> Result<M> {
        M::build(self.exp, &self.primes, &self.k)
    }
}

impl<M: ModulusRepr> fmt::Display for IpfeParams<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IpfeParams [l={}, exp={}, n={}, bx={}, by={}, k={}, primes={:?}, s1={}, s2={}, s3={}]",
            self.l,
            self.exp,
            self.n,
            self.bx,
            self.by,
            self.k,
            self.primes,
            self.sigma1,
            self.sigma2,
            self.sigma3
        )
    }
}

fn ceil_log2(n: usize) -> u32 {
    usize::BITS - n.saturating_sub(1).leading_zeros()
}

/// Estimate of the primal (uSVP) attack: the configuration is safe iff for
/// every BKZ block size b up to sec/0.265 and every number of samples
/// m < 3n the attacker's projected length exceeds the embedded secret.
fn primal_secure(n: usize, sigma: f64, b_bound: usize, q: &BigUint) -> bool {
    let qf = q.to_f64().unwrap_or(f64::INFINITY);
    for b in 50..=b_bound {
        let bf = b as f64;
        let delta = ((PI * bf).powf(1.0 / bf) * bf / (2.0 * PI * E)).powf(1.0 / (2.0 * bf - 2.0));
        let left = sigma * bf.sqrt();
        for m in 1.max(b.saturating_sub(n))..3 * n {
            let d = (n + m) as f64;
            let right = delta.powf(2.0 * bf - d - 1.0) * qf.powf(m as f64 / d);
            if left <= right {
                return false;
            }
        }
    }
    true
}
