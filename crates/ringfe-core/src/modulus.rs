//! Modulus descriptions and the two engine backends.
//!
//! A modulus is either a chain of machine-word primes (the RNS performance
//! path) or one arbitrary-precision prime. Both precompute the same table
//! set — bit-reversed ϕ powers, ϕ^{-1} powers, n^{-1}, the CRT mix
//! constants, and the residues of floor(Q/K) — and expose one operation
//! surface through [`ModulusRepr`], so the scheme never branches on the
//! representation.

use std::fmt;

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_traits::{One, ToPrimitive, Zero};
use rand::{CryptoRng, Rng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::bigring;
use crate::error::{IpfeError, Result};
use crate::ntt;
use crate::rns::{self, RnsPoly};
use crate::sampling::{self, GaussianSampler};

/// Chain primes must leave headroom for 64-bit products of 32-bit residues.
const CHAIN_PRIME_CEILING: u64 = 1 << 31;

/// Trial division is plenty below the 31-bit chain ceiling.
fn is_prime_u64(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 || n == 3 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i = 5u64;
    while i.saturating_mul(i) <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// An NTT-friendly machine-word prime: q = 1 (mod 2^(exp+1)) together with
/// ϕ, a primitive 2n-th root of unity (ϕ^n = -1 mod q) for n = 2^exp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModPrime {
    pub exp: u32,
    pub q: u32,
    pub phi: u32,
}

impl ModPrime {
    pub fn new(exp: u32, q: u32, phi: u32) -> Result<Self> {
        let prime = Self { exp, q, phi };
        prime.validate()?;
        Ok(prime)
    }

    /// The construction predicate: q prime, q = 1 (mod 2n), ϕ^n = -1.
    pub fn validate(&self) -> Result<()> {
        let n = 1u64 << self.exp;
        if !is_prime_u64(self.q as u64) {
            return Err(IpfeError::InvalidModulusPrime(format!(
                "{} is not prime",
                self.q
            )));
        }
        if (self.q as u64) % (2 * n) != 1 {
            return Err(IpfeError::InvalidModulusPrime(format!(
                "{} is not 1 mod 2^{}",
                self.q,
                self.exp + 1
            )));
        }
        if rns::mod_pow(self.phi, n, self.q) != self.q - 1 {
            return Err(IpfeError::InvalidModulusPrime(format!(
                "{} is not a primitive 2n-th root mod {}",
                self.phi, self.q
            )));
        }
        Ok(())
    }

    /// ϕ as exp successive square roots of q - 1; a failed root rejects
    /// the candidate.
    fn root_chain(exp: u32, q: u64) -> Option<u32> {
        let qb = BigUint::from(q);
        let mut phi = &qb - 1u32;
        for _ in 0..exp {
            match bigring::mod_sqrt(&phi, &qb) {
                Some(r) if !r.is_zero() => phi = r,
                _ => return None,
            }
        }
        phi.to_u32()
    }

    /// First usable prime above `lower` on the q = 1 (mod 2^(exp+1))
    /// recurrence, staying below the residue ceiling.
    fn next(exp: u32, lower: u64) -> Result<Self> {
        let inc = 1u64 << (exp + 1);
        let mut q = (lower / inc + 1) * inc + 1;
        while q < CHAIN_PRIME_CEILING {
            if is_prime_u64(q) {
                if let Some(phi) = Self::root_chain(exp, q) {
                    return Self::new(exp, q as u32, phi);
                }
            }
            q += inc;
        }
        Err(IpfeError::ParameterSearchExhausted)
    }

    /// A chain of distinct ascending primes whose product first exceeds
    /// `q_min`. The first position starts at the per-prime share
    /// `q_min^(1/len)`; each later position resumes the recurrence above
    /// its predecessor.
    pub fn chain(exp: u32, q_min: &BigUint) -> Result<Vec<Self>> {
        let mut len = 1u32;
        let mut share = q_min.clone();
        while share.bits() > 30 {
            len += 1;
            share = q_min.nth_root(len);
        }
        let mut primes = Vec::with_capacity(len as usize);
        let mut lower = share.to_u64().unwrap_or(1);
        let mut product = BigUint::one();
        while &product < q_min {
            let prime = Self::next(exp, lower)?;
            lower = prime.q as u64;
            product *= prime.q;
            primes.push(prime);
        }
        Ok(primes)
    }
}

impl fmt::Display for ModPrime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.q)
    }
}

/// An NTT-friendly prime of arbitrary bit length, with its 2n-th root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigModPrime {
    pub exp: u32,
    pub q: BigUint,
    pub phi: BigUint,
}

impl BigModPrime {
    pub fn new(exp: u32, q: BigUint, phi: BigUint) -> Result<Self> {
        let prime = Self { exp, q, phi };
        prime.validate()?;
        Ok(prime)
    }

    pub fn validate(&self) -> Result<()> {
        let two_n = BigUint::one() << (self.exp + 1);
        if !bigring::is_probable_prime(&self.q) {
            return Err(IpfeError::InvalidModulusPrime(format!(
                "{} is not prime",
                self.q
            )));
        }
        if (&self.q % &two_n) != BigUint::one() {
            return Err(IpfeError::InvalidModulusPrime(format!(
                "{} is not 1 mod 2^{}",
                self.q,
                self.exp + 1
            )));
        }
        let n = BigUint::one() << self.exp;
        if self.phi.modpow(&n, &self.q) != &self.q - 1u32 {
            return Err(IpfeError::InvalidModulusPrime(format!(
                "{} is not a primitive 2n-th root mod {}",
                self.phi, self.q
            )));
        }
        Ok(())
    }

    fn root_chain(exp: u32, q: &BigUint) -> Option<BigUint> {
        let mut phi = q - 1u32;
        for _ in 0..exp {
            match bigring::mod_sqrt(&phi, q) {
                Some(r) if !r.is_zero() => phi = r,
                _ => return None,
            }
        }
        Some(phi)
    }

    /// Least usable prime above `q_min` on the q = 1 (mod 2^(exp+1))
    /// recurrence.
    pub fn next(exp: u32, q_min: &BigUint) -> Result<Self> {
        let inc = BigUint::one() << (exp + 1);
        let mut q = (((q_min >> (exp + 1)) + 1u32) << (exp + 1)) + 1u32;
        loop {
            if bigring::is_probable_prime(&q) {
                if let Some(phi) = Self::root_chain(exp, &q) {
                    return Self::new(exp, q, phi);
                }
            }
            q += &inc;
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::ChainModulus {}
    impl Sealed for super::BigModulus {}
}

/// The operation surface shared by the two modulus representations.
///
/// `Primes` is the serializable prime description carried inside params;
/// the precomputed tables themselves are rebuilt from it on load. `Poly`
/// is the polynomial storage and `Scalars` the encoded function vector.
/// Polynomials do not track their domain; callers keep coefficient and
/// NTT representations apart, as the scheme operations do.
pub trait ModulusRepr: sealed::Sealed + Clone + fmt::Debug + Sized {
    type Primes: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned;
    type Poly: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned;
    type Scalars: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned;

    /// Prime material whose product first exceeds `q_min`, plus that product.
    fn find_primes(exp: u32, q_min: &BigUint) -> Result<(Self::Primes, BigUint)>;

    /// Extra factor this representation applies to the correctness bound.
    fn q_min_margin(l: u64, by: u64) -> BigUint;

    /// Validate the primes and precompute every table.
    fn build(exp: u32, primes: &Self::Primes, k: &BigUint) -> Result<Self>;

    fn n(&self) -> usize;

    /// Q, the product of the chain (or the single prime).
    fn value(&self) -> &BigUint;

    /// floor(Q / K), the plaintext embedding scale.
    fn scale(&self) -> &BigUint;

    fn zero_poly(&self) -> Self::Poly;
    fn poly_shape_ok(&self, p: &Self::Poly) -> bool;
    fn scalars_shape_ok(&self, y: &Self::Scalars, l: usize) -> bool;

    fn forward_ntt(&self, p: &mut Self::Poly);
    fn inverse_ntt(&self, p: &mut Self::Poly);
    fn pointwise_mul(&self, a: &Self::Poly, b: &Self::Poly) -> Self::Poly;
    fn add_assign(&self, a: &mut Self::Poly, b: &Self::Poly);
    fn sub_assign(&self, a: &mut Self::Poly, b: &Self::Poly);

    /// Negacyclic product INTT(NTT(a) ⊙ NTT(b)) of coefficient-domain inputs.
    fn poly_mul(&self, a: &Self::Poly, b: &Self::Poly) -> Self::Poly;

    /// Residues of the function vector y.
    fn encode_scalars(&self, v: &[i64]) -> Self::Scalars;

    /// Polynomial whose coefficient `row` is x[row][slot] * floor(Q/K);
    /// coefficients beyond the matrix rows stay zero.
    fn encode_column(&self, x: &[Vec<i64>], slot: usize) -> Self::Poly;

    /// acc += y[i] * p, coefficient-wise.
    fn mul_acc(&self, acc: &mut Self::Poly, p: &Self::Poly, y: &Self::Scalars, i: usize);

    /// Uniform polynomial with every coefficient in [1, q): zero excluded.
    fn sample_uniform<R: Rng + CryptoRng + ?Sized>(&self, rng: &mut R) -> Self::Poly;

    /// Gaussian polynomial: one integer draw per coefficient, reduced into
    /// every residue ring.
    fn sample_gaussian<R: Rng + CryptoRng + ?Sized>(
        &self,
        sigma: f64,
        sampler: GaussianSampler,
        rng: &mut R,
    ) -> Self::Poly;

    /// Centered representative of every coefficient in [-Q/2, Q/2).
    fn lift_centered(&self, p: &Self::Poly) -> Vec<BigInt>;
}

/// RNS backend: a sorted chain of distinct 32-bit primes.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainModulus {
    n: usize,
    primes: Vec<ModPrime>,
    qs: Vec<u32>,
    value: BigUint,
    scale: BigUint,
    phis: Vec<Vec<u32>>,
    phi_invs: Vec<Vec<u32>>,
    n_invs: Vec<u32>,
    crt_mix: Vec<u32>,
    scale_mods: Vec<u32>,
}

impl ChainModulus {
    pub fn primes(&self) -> &[ModPrime] {
        &self.primes
    }

    fn rows(&self) -> usize {
        self.qs.len()
    }
}

impl ModulusRepr for ChainModulus {
    type Primes = Vec<ModPrime>;
    type Poly = RnsPoly;
    type Scalars = Vec<Vec<u32>>;

    fn find_primes(exp: u32, q_min: &BigUint) -> Result<(Self::Primes, BigUint)> {
        let primes = ModPrime::chain(exp, q_min)?;
        let product = primes
            .iter()
            .fold(BigUint::one(), |acc, p| acc * BigUint::from(p.q));
        Ok((primes, product))
    }

    fn q_min_margin(_l: u64, _by: u64) -> BigUint {
        BigUint::one()
    }

    fn build(exp: u32, primes: &Self::Primes, k: &BigUint) -> Result<Self> {
        if primes.is_empty() {
            return Err(IpfeError::InvalidModulusPrime("empty prime chain".into()));
        }
        let mut primes = primes.clone();
        primes.sort();
        let n = 1usize << exp;
        let mut qs = Vec::with_capacity(primes.len());
        let mut value = BigUint::one();
        let mut phis = Vec::with_capacity(primes.len());
        let mut phi_invs = Vec::with_capacity(primes.len());
        let mut n_invs = Vec::with_capacity(primes.len());
        let mut crt_mix = Vec::with_capacity(primes.len());
        for (i, prime) in primes.iter().enumerate() {
            if prime.exp != exp {
                return Err(IpfeError::InvalidModulusPrime(format!(
                    "prime exponent {} does not match modulus exponent {exp}",
                    prime.exp
                )));
            }
            prime.validate()?;
            if i > 0 && primes[i - 1].q == prime.q {
                return Err(IpfeError::InvalidModulusPrime(format!(
                    "duplicate prime {} in chain",
                    prime.q
                )));
            }
            let q = prime.q;
            value *= q;
            let (p, pi) = ntt::build_twiddles(exp, prime.phi, q);
            phis.push(p);
            phi_invs.push(pi);
            n_invs.push(rns::mod_inv(n as u32, q));
            // crt_mix[j] = (q_0 ... q_{j-1})^{-1} mod q_j; position 0 unused.
            let mut c = 0u32;
            if i > 0 {
                c = 1;
                for prev in &primes[..i] {
                    c = rns::mod_mul(c, rns::mod_inv(prev.q % q, q), q);
                }
            }
            crt_mix.push(c);
            qs.push(q);
        }
        let scale = &value / k;
        let scale_mods = qs
            .iter()
            .map(|&q| (scale.clone() % q).to_u32().expect("residue fits in u32"))
            .collect();
        Ok(Self {
            n,
            primes,
            qs,
            value,
            scale,
            phis,
            phi_invs,
            n_invs,
            crt_mix,
            scale_mods,
        })
    }

    fn n(&self) -> usize {
        self.n
    }

    fn value(&self) -> &BigUint {
        &self.value
    }

    fn scale(&self) -> &BigUint {
        &self.scale
    }

    fn zero_poly(&self) -> RnsPoly {
        RnsPoly::zero(self.rows(), self.n)
    }

    fn poly_shape_ok(&self, p: &RnsPoly) -> bool {
        p.rows() == self.rows() && p.n() == self.n
    }

    fn scalars_shape_ok(&self, y: &Self::Scalars, l: usize) -> bool {
        y.len() == self.rows() && y.iter().all(|row| row.len() == l)
    }

    fn forward_ntt(&self, p: &mut RnsPoly) {
        for sel in 0..self.rows() {
            ntt::forward_ntt(p.row_mut(sel), &self.phis[sel], self.qs[sel]);
        }
    }

    fn inverse_ntt(&self, p: &mut RnsPoly) {
        for sel in 0..self.rows() {
            ntt::inverse_ntt(p.row_mut(sel), &self.phi_invs[sel], self.n_invs[sel], self.qs[sel]);
        }
    }

    fn pointwise_mul(&self, a: &RnsPoly, b: &RnsPoly) -> RnsPoly {
        let mut c = a.clone();
        for sel in 0..self.rows() {
            rns::row_mul_assign(c.row_mut(sel), b.row(sel), self.qs[sel]);
        }
        c
    }

    fn add_assign(&self, a: &mut RnsPoly, b: &RnsPoly) {
        for sel in 0..self.rows() {
            rns::row_add_assign(a.row_mut(sel), b.row(sel), self.qs[sel]);
        }
    }

    fn sub_assign(&self, a: &mut RnsPoly, b: &RnsPoly) {
        for sel in 0..self.rows() {
            rns::row_sub_assign(a.row_mut(sel), b.row(sel), self.qs[sel]);
        }
    }

    fn poly_mul(&self, a: &RnsPoly, b: &RnsPoly) -> RnsPoly {
        let mut a = a.clone();
        let mut b = b.clone();
        self.forward_ntt(&mut a);
        self.forward_ntt(&mut b);
        for sel in 0..self.rows() {
            rns::row_mul_assign(a.row_mut(sel), b.row(sel), self.qs[sel]);
        }
        self.inverse_ntt(&mut a);
        a
    }

    fn encode_scalars(&self, v: &[i64]) -> Self::Scalars {
        self.qs
            .iter()
            .map(|&q| v.iter().map(|&yi| rns::floor_mod(yi, q)).collect())
            .collect()
    }

    fn encode_column(&self, x: &[Vec<i64>], slot: usize) -> RnsPoly {
        let mut poly = self.zero_poly();
        for sel in 0..self.rows() {
            let q = self.qs[sel];
            let scale = self.scale_mods[sel];
            let row = poly.row_mut(sel);
            for (k, x_row) in x.iter().enumerate() {
                row[k] = rns::mod_mul(rns::floor_mod(x_row[slot], q), scale, q);
            }
        }
        poly
    }

    fn mul_acc(&self, acc: &mut RnsPoly, p: &RnsPoly, y: &Self::Scalars, i: usize) {
        for sel in 0..self.rows() {
            rns::row_mul_acc(acc.row_mut(sel), p.row(sel), y[sel][i], self.qs[sel]);
        }
    }

    fn sample_uniform<R: Rng + CryptoRng + ?Sized>(&self, rng: &mut R) -> RnsPoly {
        let mut poly = self.zero_poly();
        for sel in 0..self.rows() {
            let q = self.qs[sel];
            for v in poly.row_mut(sel).iter_mut() {
                *v = rng.gen_range(1..q);
            }
        }
        poly
    }

    fn sample_gaussian<R: Rng + CryptoRng + ?Sized>(
        &self,
        sigma: f64,
        sampler: GaussianSampler,
        rng: &mut R,
    ) -> RnsPoly {
        let draws = sampling::gaussian_draws(sigma, sampler, self.n, rng);
        let mut poly = self.zero_poly();
        for sel in 0..self.rows() {
            let q = self.qs[sel];
            let row = poly.row_mut(sel);
            for (j, &d) in draws.iter().enumerate() {
                row[j] = rns::floor_mod(d, q);
            }
        }
        poly
    }

    fn lift_centered(&self, p: &RnsPoly) -> Vec<BigInt> {
        rns::crt_lift_centered(p, &self.qs, &self.crt_mix)
    }
}

/// Big-integer backend: a single prime of arbitrary bit length.
#[derive(Clone, Debug, PartialEq)]
pub struct BigModulus {
    n: usize,
    prime: BigModPrime,
    value: BigUint,
    scale: BigUint,
    phis: Vec<BigUint>,
    phi_invs: Vec<BigUint>,
    n_inv: BigUint,
}

impl BigModulus {
    pub fn prime(&self) -> &BigModPrime {
        &self.prime
    }
}

impl ModulusRepr for BigModulus {
    type Primes = BigModPrime;
    type Poly = Vec<BigUint>;
    type Scalars = Vec<BigUint>;

    fn find_primes(exp: u32, q_min: &BigUint) -> Result<(Self::Primes, BigUint)> {
        let prime = BigModPrime::next(exp, q_min)?;
        let q = prime.q.clone();
        Ok((prime, q))
    }

    fn q_min_margin(l: u64, by: u64) -> BigUint {
        BigUint::from(l) * BigUint::from(by)
    }

    fn build(exp: u32, primes: &Self::Primes, k: &BigUint) -> Result<Self> {
        if primes.exp != exp {
            return Err(IpfeError::InvalidModulusPrime(format!(
                "prime exponent {} does not match modulus exponent {exp}",
                primes.exp
            )));
        }
        primes.validate()?;
        let n = 1usize << exp;
        let (phis, phi_invs) = bigring::build_twiddles(exp, &primes.phi, &primes.q);
        let n_inv = bigring::big_inv(&BigUint::from(n as u64), &primes.q);
        let value = primes.q.clone();
        let scale = &value / k;
        Ok(Self {
            n,
            prime: primes.clone(),
            value,
            scale,
            phis,
            phi_invs,
            n_inv,
        })
    }

    fn n(&self) -> usize {
        self.n
    }

    fn value(&self) -> &BigUint {
        &self.value
    }

    fn scale(&self) -> &BigUint {
        &self.scale
    }

    fn zero_poly(&self) -> Vec<BigUint> {
        vec![BigUint::zero(); self.n]
    }

    fn poly_shape_ok(&self, p: &Vec<BigUint>) -> bool {
        p.len() == self.n
    }

    fn scalars_shape_ok(&self, y: &Vec<BigUint>, l: usize) -> bool {
        y.len() == l
    }

    fn forward_ntt(&self, p: &mut Vec<BigUint>) {
        bigring::forward_ntt(p, &self.phis, &self.value);
    }

    fn inverse_ntt(&self, p: &mut Vec<BigUint>) {
        bigring::inverse_ntt(p, &self.phi_invs, &self.n_inv, &self.value);
    }

    fn pointwise_mul(&self, a: &Vec<BigUint>, b: &Vec<BigUint>) -> Vec<BigUint> {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| bigring::big_mul(x, y, &self.value))
            .collect()
    }

    fn add_assign(&self, a: &mut Vec<BigUint>, b: &Vec<BigUint>) {
        for (x, y) in a.iter_mut().zip(b.iter()) {
            *x = bigring::big_add(x, y, &self.value);
        }
    }

    fn sub_assign(&self, a: &mut Vec<BigUint>, b: &Vec<BigUint>) {
        for (x, y) in a.iter_mut().zip(b.iter()) {
            *x = bigring::big_sub(x, y, &self.value);
        }
    }

    fn poly_mul(&self, a: &Vec<BigUint>, b: &Vec<BigUint>) -> Vec<BigUint> {
        let mut a = a.clone();
        let mut b = b.clone();
        self.forward_ntt(&mut a);
        self.forward_ntt(&mut b);
        for (x, y) in a.iter_mut().zip(b.iter()) {
            *x = bigring::big_mul(x, y, &self.value);
        }
        self.inverse_ntt(&mut a);
        a
    }

    fn encode_scalars(&self, v: &[i64]) -> Vec<BigUint> {
        v.iter()
            .map(|&yi| bigring::big_floor_mod(&BigInt::from(yi), &self.value))
            .collect()
    }

    fn encode_column(&self, x: &[Vec<i64>], slot: usize) -> Vec<BigUint> {
        let mut poly = self.zero_poly();
        for (k, x_row) in x.iter().enumerate() {
            let v = bigring::big_floor_mod(&BigInt::from(x_row[slot]), &self.value);
            poly[k] = bigring::big_mul(&v, &self.scale, &self.value);
        }
        poly
    }

    fn mul_acc(&self, acc: &mut Vec<BigUint>, p: &Vec<BigUint>, y: &Vec<BigUint>, i: usize) {
        for (a, c) in acc.iter_mut().zip(p.iter()) {
            *a = bigring::big_add(a, &bigring::big_mul(&y[i], c, &self.value), &self.value);
        }
    }

    fn sample_uniform<R: Rng + CryptoRng + ?Sized>(&self, rng: &mut R) -> Vec<BigUint> {
        let one = BigUint::one();
        (0..self.n)
            .map(|_| rng.gen_biguint_range(&one, &self.value))
            .collect()
    }

    fn sample_gaussian<R: Rng + CryptoRng + ?Sized>(
        &self,
        sigma: f64,
        sampler: GaussianSampler,
        rng: &mut R,
    ) -> Vec<BigUint> {
        sampling::gaussian_draws(sigma, sampler, self.n, rng)
            .into_iter()
            .map(|d| bigring::big_floor_mod(&BigInt::from(d), &self.value))
            .collect()
    }

    fn lift_centered(&self, p: &Vec<BigUint>) -> Vec<BigInt> {
        let half = &self.value >> 1u32;
        let q = BigInt::from(self.value.clone());
        p.iter()
            .map(|c| {
                let v = BigInt::from(c.clone());
                if *c >= half {
                    v - &q
                } else {
                    v
                }
            })
            .collect()
    }
}
