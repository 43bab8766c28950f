//! Arbitrary-precision ring arithmetic for the single-big-prime backend.
//!
//! Mirrors the 32-bit primitives in `rns`/`ntt` over `BigUint`, and hosts
//! the number-theoretic helpers both backends share: Miller-Rabin
//! primality, the Tonelli-Shanks square root used to walk down to a
//! primitive 2n-th root, and the half-to-even division that turns lifted
//! decryption values back into integers.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};

use crate::rns::bit_reverse;

/// (a + b) mod q.
#[inline]
pub fn big_add(a: &BigUint, b: &BigUint, q: &BigUint) -> BigUint {
    let s = a + b;
    if &s >= q {
        s - q
    } else {
        s
    }
}

/// (a - b) mod q.
#[inline]
pub fn big_sub(a: &BigUint, b: &BigUint, q: &BigUint) -> BigUint {
    if a >= b {
        a - b
    } else {
        q - b + a
    }
}

/// (a * b) mod q.
#[inline]
pub fn big_mul(a: &BigUint, b: &BigUint, q: &BigUint) -> BigUint {
    (a * b) % q
}

/// a^{-1} mod q via Fermat; q must be prime.
pub fn big_inv(a: &BigUint, q: &BigUint) -> BigUint {
    a.modpow(&(q - 2u32), q)
}

/// Canonical residue of a signed value in [0, q).
pub fn big_floor_mod(v: &BigInt, q: &BigUint) -> BigUint {
    let qb = BigInt::from(q.clone());
    let r = ((v % &qb) + &qb) % &qb;
    r.to_biguint().expect("residue is non-negative")
}

/// Powers of ϕ and ϕ^{-1} at bit-reversed indices, the big-integer
/// analogue of `ntt::build_twiddles`.
pub fn build_twiddles(exp: u32, phi: &BigUint, q: &BigUint) -> (Vec<BigUint>, Vec<BigUint>) {
    let n = 1usize << exp;
    let phi_inv = big_inv(phi, q);
    let mut phis = vec![BigUint::zero(); n];
    let mut phi_invs = vec![BigUint::zero(); n];
    let mut x = BigUint::one();
    let mut xi = BigUint::one();
    for i in 0..n {
        let rev = bit_reverse(i as u32, exp) as usize;
        phis[rev] = x.clone();
        phi_invs[rev] = xi.clone();
        x = big_mul(&x, phi, q);
        xi = big_mul(&xi, &phi_inv, q);
    }
    (phis, phi_invs)
}

/// In-place forward NTT, Cooley-Tukey schedule identical to the u32 path.
pub fn forward_ntt(a: &mut [BigUint], phis: &[BigUint], q: &BigUint) {
    let n = a.len();
    debug_assert_eq!(n, phis.len());
    let mut t = n;
    let mut m = 1;
    while m < n {
        t /= 2;
        for i in 0..m {
            let j1 = 2 * i * t;
            let s = &phis[m + i];
            for j in j1..j1 + t {
                let u = a[j].clone();
                let v = big_mul(&a[j + t], s, q);
                a[j] = big_add(&u, &v, q);
                a[j + t] = big_sub(&u, &v, q);
            }
        }
        m *= 2;
    }
}

/// In-place inverse NTT, Gentleman-Sande schedule with final n^{-1} scaling.
pub fn inverse_ntt(a: &mut [BigUint], phi_invs: &[BigUint], n_inv: &BigUint, q: &BigUint) {
    let n = a.len();
    debug_assert_eq!(n, phi_invs.len());
    let mut t = 1;
    let mut m = n;
    while m > 1 {
        let h = m / 2;
        let mut j1 = 0;
        for i in 0..h {
            let s = &phi_invs[h + i];
            for j in j1..j1 + t {
                let u = a[j].clone();
                let v = a[j + t].clone();
                a[j] = big_add(&u, &v, q);
                a[j + t] = big_mul(&big_sub(&u, &v, q), s, q);
            }
            j1 += 2 * t;
        }
        t *= 2;
        m = h;
    }
    for x in a.iter_mut() {
        *x = big_mul(x, n_inv, q);
    }
}

/// Miller-Rabin primality test with a fixed witness set.
///
/// The first twelve primes as bases are deterministic below 3.3 * 10^24
/// and leave a vanishing error probability beyond.
pub fn is_probable_prime(n: &BigUint) -> bool {
    const WITNESSES: [u32; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    for &w in &WITNESSES {
        let wb = BigUint::from(w);
        if n == &wb {
            return true;
        }
        if (n % &wb).is_zero() {
            return false;
        }
    }
    let n_minus_1 = n - 1u32;
    let s = n_minus_1.trailing_zeros().unwrap_or(0);
    let d = &n_minus_1 >> s;
    'witness: for &w in &WITNESSES {
        let mut x = BigUint::from(w).modpow(&d, n);
        if x.is_one() || x == n_minus_1 {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Tonelli-Shanks square root modulo an odd prime p.
///
/// Returns `None` when `n` is a non-residue (detected by the final
/// verification, so a root that exists is always found).
pub fn mod_sqrt(n: &BigUint, p: &BigUint) -> Option<BigUint> {
    let n = n % p;
    if n.is_zero() {
        return Some(BigUint::zero());
    }
    let one = BigUint::one();
    let p_minus_1 = p - &one;
    let s = p_minus_1.trailing_zeros().unwrap_or(0);
    let q = &p_minus_1 >> s;

    if s == 1 {
        // p = 3 mod 4
        let r = n.modpow(&((p + &one) >> 2u32), p);
        return if big_mul(&r, &r, p) == n { Some(r) } else { None };
    }

    // Any quadratic non-residue will do as the generator of the 2-Sylow part.
    let half = &p_minus_1 >> 1u32;
    let mut z = BigUint::from(2u32);
    while z.modpow(&half, p) != p_minus_1 {
        z += 1u32;
    }

    let mut c = z.modpow(&q, p);
    let mut r = n.modpow(&((&q + &one) >> 1u32), p);
    let mut t = n.modpow(&q, p);
    let mut m = s;
    while !t.is_one() {
        let mut u = t.clone();
        let mut i = 0u64;
        while !u.is_one() {
            u = big_mul(&u, &u, p);
            i += 1;
            if i == m {
                return None;
            }
        }
        let mut b = c.clone();
        for _ in 0..(m - i - 1) {
            b = big_mul(&b, &b, p);
        }
        r = big_mul(&r, &b, p);
        c = big_mul(&b, &b, p);
        t = big_mul(&t, &c, p);
        m = i;
    }
    if big_mul(&r, &r, p) == n {
        Some(r)
    } else {
        None
    }
}

/// Round num / den to the nearest integer, ties to even (banker's rounding).
pub fn div_round_half_even(num: &BigInt, den: &BigUint) -> BigInt {
    let den = BigInt::from(den.clone());
    debug_assert!(den.sign() == Sign::Plus, "denominator must be positive");
    let q = num / &den;
    let r = num - &q * &den;
    let twice: BigInt = r.magnitude().clone().into();
    let twice = twice << 1u32;
    let step = if num.sign() == Sign::Minus {
        BigInt::from(-1)
    } else {
        BigInt::from(1)
    };
    match twice.cmp(&den) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + step,
        std::cmp::Ordering::Equal => {
            if (q.clone() % 2i32).is_zero() {
                q
            } else {
                q + step
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_is_probable_prime_known_values() {
        for p in [2u64, 3, 5, 17, 97, 193, 7681, 12289, 2_147_565_569, 4_294_828_033] {
            assert!(is_probable_prime(&big(p)), "{p} should be prime");
        }
        for c in [1u64, 4, 15, 91, 561, 6601] {
            assert!(!is_probable_prime(&big(c)), "{c} should be composite");
        }
        // A Carmichael-heavy stress value: 3215031751 fools bases {2,3,5,7}.
        assert!(!is_probable_prime(&big(3_215_031_751)));
    }

    #[test]
    fn test_mod_sqrt_all_residues() {
        let p = big(97);
        let mut residues = 0;
        for v in 1u64..97 {
            let n = big(v);
            match mod_sqrt(&n, &p) {
                Some(r) => {
                    assert_eq!(big_mul(&r, &r, &p), n, "bad root for {v}");
                    residues += 1;
                }
                None => {}
            }
        }
        // Exactly (p-1)/2 quadratic residues.
        assert_eq!(residues, 48);
    }

    #[test]
    fn test_mod_sqrt_chain_reaches_2n_th_root() {
        // 7681 = 1 + 2^9 * 15: taking exp = 8 successive roots of -1 must
        // produce phi with phi^256 = -1.
        let p = big(7681);
        let exp = 8u32;
        let mut phi = &p - 1u32;
        for _ in 0..exp {
            phi = mod_sqrt(&phi, &p).expect("chain root must exist");
        }
        assert_eq!(phi.modpow(&big(1 << exp), &p), &p - 1u32);
    }

    #[test]
    fn test_big_ntt_roundtrip() {
        let p = big(7681);
        let exp = 3u32;
        let n = 1usize << exp;
        // phi for n = 8: walk the square-root chain from -1.
        let mut phi = &p - 1u32;
        for _ in 0..exp {
            phi = mod_sqrt(&phi, &p).expect("root exists");
        }
        let (phis, phi_invs) = build_twiddles(exp, &phi, &p);
        let n_inv = big_inv(&big(n as u64), &p);

        let original: Vec<BigUint> = (0..n as u64).map(big).collect();
        let mut a = original.clone();
        forward_ntt(&mut a, &phis, &p);
        inverse_ntt(&mut a, &phi_invs, &n_inv, &p);
        assert_eq!(a, original);
    }

    #[test]
    fn test_div_round_half_even() {
        let den = big(2);
        let cases = [
            (5i64, 2i64),   // 2.5 -> 2
            (7, 4),         // 3.5 -> 4
            (-5, -2),       // -2.5 -> -2
            (-7, -4),       // -3.5 -> -4
            (4, 2),
            (-4, -2),
            (0, 0),
        ];
        for (num, expected) in cases {
            assert_eq!(
                div_round_half_even(&BigInt::from(num), &den),
                BigInt::from(expected),
                "num={num}"
            );
        }
        // Non-tie cases round to nearest.
        let den = big(10);
        assert_eq!(div_round_half_even(&BigInt::from(14), &den), BigInt::from(1));
        assert_eq!(div_round_half_even(&BigInt::from(16), &den), BigInt::from(2));
        assert_eq!(div_round_half_even(&BigInt::from(-14), &den), BigInt::from(-1));
        assert_eq!(div_round_half_even(&BigInt::from(-16), &den), BigInt::from(-2));
    }
}
