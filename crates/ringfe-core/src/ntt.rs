//! Number Theoretic Transform for negacyclic polynomial arithmetic.
//!
//! Polynomial products in Z_q[X]/(X^n + 1) are computed as
//! `INTT(NTT(a) ⊙ NTT(b))`. The twiddle tables hold powers of ϕ (a
//! primitive 2n-th root of unity) in bit-reversed order, so the negacyclic
//! twist is absorbed into the butterflies and no separate pre/post twist is
//! applied.

use crate::rns::{bit_reverse, mod_add, mod_inv, mod_mul, mod_sub};

/// Powers of ϕ and ϕ^{-1} stored at bit-reversed indices, as consumed by
/// the Cooley-Tukey / Gentleman-Sande schedules below.
pub fn build_twiddles(exp: u32, phi: u32, q: u32) -> (Vec<u32>, Vec<u32>) {
    let n = 1usize << exp;
    let phi_inv = mod_inv(phi, q);
    let mut phis = vec![0u32; n];
    let mut phi_invs = vec![0u32; n];
    let mut x = 1u32;
    let mut xi = 1u32;
    for i in 0..n {
        let rev = bit_reverse(i as u32, exp) as usize;
        phis[rev] = x;
        phi_invs[rev] = xi;
        x = mod_mul(x, phi, q);
        xi = mod_mul(xi, phi_inv, q);
    }
    (phis, phi_invs)
}

/// In-place forward NTT (Cooley-Tukey, decimation in time).
///
/// Input in natural order, output in bit-reversed order. For each stage
/// m = 1, 2, ..., n/2 with t = n/(2m), butterfly i uses twiddle phi[m + i]:
/// (U, V) = (a[j], S * a[j+t]) becomes (U + V, U - V).
pub fn forward_ntt(a: &mut [u32], phis: &[u32], q: u32) {
    let n = a.len();
    debug_assert_eq!(n, phis.len());
    let mut t = n;
    let mut m = 1;
    while m < n {
        t /= 2;
        for i in 0..m {
            let j1 = 2 * i * t;
            let s = phis[m + i];
            for j in j1..j1 + t {
                let u = a[j];
                let v = mod_mul(a[j + t], s, q);
                a[j] = mod_add(u, v, q);
                a[j + t] = mod_sub(u, v, q);
            }
        }
        m *= 2;
    }
}

/// In-place inverse NTT (Gentleman-Sande, decimation in frequency).
///
/// Mirrors the forward schedule with twiddles phi_inv[h + i]; after the
/// last stage every coefficient is scaled by n^{-1} mod q.
pub fn inverse_ntt(a: &mut [u32], phi_invs: &[u32], n_inv: u32, q: u32) {
    let n = a.len();
    debug_assert_eq!(n, phi_invs.len());
    let mut t = 1;
    let mut m = n;
    while m > 1 {
        let h = m / 2;
        let mut j1 = 0;
        for i in 0..h {
            let s = phi_invs[h + i];
            for j in j1..j1 + t {
                let u = a[j];
                let v = a[j + t];
                a[j] = mod_add(u, v, q);
                a[j + t] = mod_mul(mod_sub(u, v, q), s, q);
            }
            j1 += 2 * t;
        }
        t *= 2;
        m = h;
    }
    for x in a.iter_mut() {
        *x = mod_mul(*x, n_inv, q);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rns::mod_pow;

    /// Brute-force a primitive 2n-th root: phi with phi^n = -1 mod q.
    fn find_phi(n: usize, q: u32) -> u32 {
        for phi in 2..q {
            if mod_pow(phi, n as u64, q) == q - 1 {
                return phi;
            }
        }
        panic!("no primitive 2n-th root for q={q}, n={n}");
    }

    /// Schoolbook negacyclic convolution: wrap-around picks up a sign flip.
    fn schoolbook_negacyclic(a: &[u32], b: &[u32], q: u32) -> Vec<u32> {
        let n = a.len();
        let mut c = vec![0u32; n];
        for i in 0..n {
            for j in 0..n {
                let prod = mod_mul(a[i], b[j], q);
                if i + j < n {
                    c[i + j] = mod_add(c[i + j], prod, q);
                } else {
                    c[i + j - n] = mod_sub(c[i + j - n], prod, q);
                }
            }
        }
        c
    }

    #[test]
    fn test_ntt_roundtrip() {
        let exp = 3u32;
        let n = 1usize << exp;
        let q = 97u32; // 97 = 6 * 16 + 1
        let phi = find_phi(n, q);
        let (phis, phi_invs) = build_twiddles(exp, phi, q);
        let n_inv = mod_inv(n as u32, q);

        let original: Vec<u32> = (0..n as u32).collect();
        let mut a = original.clone();
        forward_ntt(&mut a, &phis, q);
        assert_ne!(a, original);
        inverse_ntt(&mut a, &phi_invs, n_inv, q);
        assert_eq!(a, original);
    }

    #[test]
    fn test_ntt_matches_schoolbook_convolution() {
        let exp = 4u32;
        let n = 1usize << exp;
        let q = 193u32; // 193 = 6 * 32 + 1
        let phi = find_phi(n, q);
        let (phis, phi_invs) = build_twiddles(exp, phi, q);
        let n_inv = mod_inv(n as u32, q);

        // A few deterministic pseudo-random vectors.
        let mut state = 1u64;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) % q as u64) as u32
        };
        for _ in 0..8 {
            let a: Vec<u32> = (0..n).map(|_| next()).collect();
            let b: Vec<u32> = (0..n).map(|_| next()).collect();
            let expected = schoolbook_negacyclic(&a, &b, q);

            let mut a_ntt = a.clone();
            let mut b_ntt = b.clone();
            forward_ntt(&mut a_ntt, &phis, q);
            forward_ntt(&mut b_ntt, &phis, q);
            let mut c: Vec<u32> = a_ntt
                .iter()
                .zip(b_ntt.iter())
                .map(|(&x, &y)| mod_mul(x, y, q))
                .collect();
            inverse_ntt(&mut c, &phi_invs, n_inv, q);
            assert_eq!(c, expected);
        }
    }

    #[test]
    fn test_negacyclic_wraparound_sign() {
        // X^(n-1) * X = X^n = -1 mod (X^n + 1).
        let exp = 2u32;
        let n = 1usize << exp;
        let q = 17u32; // 17 = 2 * 8 + 1
        let phi = find_phi(n, q);
        let (phis, phi_invs) = build_twiddles(exp, phi, q);
        let n_inv = mod_inv(n as u32, q);

        let mut a = vec![0u32; n];
        a[n - 1] = 1;
        let mut b = vec![0u32; n];
        b[1] = 1;
        forward_ntt(&mut a, &phis, q);
        forward_ntt(&mut b, &phis, q);
        let mut c: Vec<u32> = a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| mod_mul(x, y, q))
            .collect();
        inverse_ntt(&mut c, &phi_invs, n_inv, q);
        assert_eq!(c, vec![q - 1, 0, 0, 0]);
    }
}
