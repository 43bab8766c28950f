//! Discrete Gaussian and uniform sampling.
//!
//! Two interchangeable Gaussian algorithms:
//!
//! - [`GaussianSampler::Rounded`] — draw a continuous normal and round
//!   half-to-even. Fast, and adequate whenever constant-time execution is
//!   not required.
//! - [`GaussianSampler::Facct`] — the FACCT construction: a short CDT for
//!   the half-line base sampler with parameter sqrt(1 / (2 ln 2)), widened
//!   by a factor k = round(sigma * sqrt(2 ln 2)) and corrected by a
//!   Bernoulli(2^-T/k^2) rejection evaluated from the bits of an IEEE
//!   double. The comparisons are branch-free bit arithmetic.
//!
//! Uniform residues are drawn from [1, q): zero is excluded.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// sqrt(2 ln 2): converts a target standard deviation into the CDT widening
/// factor k.
pub const INV_SIGMA_CDT: f64 = 1.177_410_022_515_474_7;

/// Cumulative table of the half-line base sampler, as (low, high) pairs of
/// a 126-bit threshold. The top bit of each half is masked off the random
/// words before comparison.
const CDT_TABLE: [[u64; 2]; 9] = [
    [2200310400551559144, 3327841033070651387],
    [7912151619254726620, 380075531178589176],
    [5167367257772081627, 11604843442081400],
    [5081592746475748971, 90134450315532],
    [6522074513864805092, 175786317361],
    [2579734681240182346, 85801740],
    [8175784047440310133, 10472],
    [2947787991558061753, 0],
    [22489665999543, 0],
];

const CDT_LOW_MASK: u64 = 0x7FFF_FFFF_FFFF_FFFF;

/// Horner coefficients approximating 2^z on [0, 1), highest degree first.
const EXP_COEF: [f64; 10] = [
    1.432910037894391e-7,
    1.2303944375555413e-6,
    1.5359914219462012e-5,
    1.5396043210538638e-4,
    0.0013333877552501097,
    0.009618120933175645,
    0.05550410984131825,
    0.24022650687652775,
    0.6931471805619338,
    1.0,
];

const MANTISSA_PRECISION: u32 = 52;
const MANTISSA_MASK: u64 = (1u64 << MANTISSA_PRECISION) - 1;
const SAMPLE_BIT_LEN: i64 = 72 - MANTISSA_PRECISION as i64 - 1;
const MAX_EXP: i64 = 1023;

/// Which discrete Gaussian algorithm the scheme draws from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GaussianSampler {
    #[default]
    Rounded,
    Facct,
}

/// The widening factor k and its inverse square for a target sigma.
pub fn facct_scale(sigma: f64) -> (u64, f64) {
    let k = ((sigma * INV_SIGMA_CDT).round() as u64).max(1);
    (k, 1.0 / (k as f64 * k as f64))
}

/// One draw from the rounded-normal fast path.
pub fn normal_rounded<R: Rng + ?Sized>(sigma: f64, rng: &mut R) -> i64 {
    let normal = Normal::new(0.0, sigma).expect("invalid sigma for Gaussian");
    normal.sample(rng).round_ties_even() as i64
}

/// `count` draws from the selected Gaussian algorithm.
pub fn gaussian_draws<R: Rng + ?Sized>(
    sigma: f64,
    sampler: GaussianSampler,
    count: usize,
    rng: &mut R,
) -> Vec<i64> {
    match sampler {
        GaussianSampler::Rounded => {
            let normal = Normal::new(0.0, sigma).expect("invalid sigma for Gaussian");
            (0..count)
                .map(|_| normal.sample(rng).round_ties_even() as i64)
                .collect()
        }
        GaussianSampler::Facct => {
            let (k, k2_inv) = facct_scale(sigma);
            (0..count).map(|_| normal_facct(k, k2_inv, rng)).collect()
        }
    }
}

/// One draw from the FACCT sampler with precomputed (k, 1/k^2).
///
/// The pair (r = 0, sign = +1) is rejected so zero is not counted twice;
/// (r = 0, sign = -1) passes and yields zero.
pub fn normal_facct<R: Rng + ?Sized>(k: u64, k2_inv: f64, rng: &mut R) -> i64 {
    loop {
        let x = half_gaussian_cdt(rng);
        let y = rng.gen_range(0..k);
        let negative = rng.gen::<bool>();
        let res = x * k;
        let check_val = (2 * res + y) as u128 * y as u128;
        let res = res + y;
        if bernoulli_exp(check_val, k2_inv, rng) && (res > 0 || negative) {
            return if negative { -(res as i64) } else { res as i64 };
        }
    }
}

/// Half-line CDT inversion with two fresh 63-bit words: counts how many
/// table thresholds exceed the drawn value, branch-free.
fn half_gaussian_cdt<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    let r1 = rng.next_u64() & CDT_LOW_MASK;
    let r2 = rng.next_u64() & CDT_LOW_MASK;
    let mut x = 0u64;
    for row in &CDT_TABLE {
        let lo = row[0];
        let hi = row[1];
        let d_lo = r1.wrapping_sub(lo);
        let d_hi = r2.wrapping_sub(hi);
        let d_hi_rev = hi.wrapping_sub(r2);
        x += ((d_lo & ((1u64 << 63) ^ (d_hi | d_hi_rev))) | d_hi) >> 63;
    }
    x
}

/// Bernoulli trial with success probability 2^(-t / k^2).
///
/// Splits the exponent as a = -floor(-a) + z, evaluates 2^z by Horner,
/// then compares fresh randomness against the mantissa and the rebiased
/// exponent of the resulting double. An exact 2^z == 1.0 accepts outright.
fn bernoulli_exp<R: Rng + ?Sized>(t: u128, k2_inv: f64, rng: &mut R) -> bool {
    let a = -(t as f64) * k2_inv;
    let neg_floor_a = -a.floor();
    let z = a + neg_floor_a;
    let mut pow_of_z = EXP_COEF[0];
    for c in &EXP_COEF[1..] {
        pow_of_z = pow_of_z * z + c;
    }
    let bits = pow_of_z.to_bits();
    let mantissa = bits & MANTISSA_MASK;
    let exponent = (bits >> MANTISSA_PRECISION) as i64 - neg_floor_a as i64;
    let r1 = rng.next_u64() >> (64 - MANTISSA_PRECISION - 1);
    let r2 = rng.next_u64() >> (64 - SAMPLE_BIT_LEN as u32);
    let check1 = mantissa | (1u64 << MANTISSA_PRECISION);
    // The shift count is taken modulo 64; in-range sigma never goes negative
    // here (the CDT bounds x, so the exponent stays above -20).
    let check2 = 1u64.wrapping_shl((SAMPLE_BIT_LEN + exponent + 1 - MAX_EXP) as u32);
    (r1 < check1 && r2 < check2) || pow_of_z == 1.0
}
