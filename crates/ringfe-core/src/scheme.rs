//! The inner-product functional encryption scheme.
//!
//! A holder of the master secret key derives function keys for integer
//! vectors y; a ciphertext encrypting a vector (or a matrix, one vector
//! per row under shared randomness) then decrypts to exactly the inner
//! products <x_row, y> and nothing else. `decrypt_all` is the full
//! recovery path available to the master-key holder.
//!
//! The scheme is selectively secure under ring-LWE; see
//! "Efficient Lattice-Based Inner-Product Functional Encryption"
//! (https://eprint.iacr.org/2021/046).

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rand::{CryptoRng, Rng};

use crate::bigring;
use crate::ciphertext::{Ciphertext, FunctionKey, PublicKey, SecretKey};
use crate::error::{IpfeError, Result};
use crate::modulus::ModulusRepr;
use crate::params::IpfeParams;
use crate::sampling::GaussianSampler;

/// One scheme instance: parameters plus the rebuilt modulus tables.
///
/// The instance is immutable after construction and safe to share across
/// threads; every randomized operation takes the caller's CSPRNG.
#[derive(Debug)]
pub struct RlweIpfe<M: ModulusRepr> {
    pub params: IpfeParams<M>,
    modulus: M,
    sampler: GaussianSampler,
}

impl<M: ModulusRepr> RlweIpfe<M> {
    /// Instantiate from existing parameters, rebuilding the modulus tables.
    pub fn new(params: IpfeParams<M>) -> Result<Self> {
        let modulus = params.modulus()?;
        Ok(Self {
            params,
            modulus,
            sampler: GaussianSampler::default(),
        })
    }

    /// Search parameters for the given constraints and instantiate.
    pub fn generate(sec: u32, l: usize, n_rows: usize, bx: i64, by: i64) -> Result<Self> {
        Self::new(IpfeParams::generate(sec, l, n_rows, bx, by)?)
    }

    /// Select the discrete Gaussian algorithm used by all sampling.
    pub fn with_sampler(mut self, sampler: GaussianSampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn modulus(&self) -> &M {
        &self.modulus
    }

    /// Master secret key: l Gaussian polynomials with std-dev sigma1.
    pub fn generate_secret_key<R: Rng + CryptoRng + ?Sized>(&self, rng: &mut R) -> SecretKey<M> {
        let sk = (0..self.params.l)
            .map(|_| {
                self.modulus
                    .sample_gaussian(self.params.sigma1, self.sampler, rng)
            })
            .collect();
        SecretKey { sk }
    }

    /// Master public key: uniform `a` and `pk_i = a * NTT(sk_i) + NTT(e_i)`
    /// pointwise in the NTT domain.
    pub fn generate_public_key<R: Rng + CryptoRng + ?Sized>(
        &self,
        msk: &SecretKey<M>,
        rng: &mut R,
    ) -> Result<PublicKey<M>> {
        msk.validate(self.params.l, &self.modulus)?;
        let m = &self.modulus;
        let a = m.sample_uniform(rng);
        let mut pk = Vec::with_capacity(self.params.l);
        for sk_i in &msk.sk {
            let mut e = m.sample_gaussian(self.params.sigma1, self.sampler, rng);
            let mut sk_ntt = sk_i.clone();
            m.forward_ntt(&mut sk_ntt);
            m.forward_ntt(&mut e);
            let mut pk_i = m.pointwise_mul(&a, &sk_ntt);
            m.add_assign(&mut pk_i, &e);
            pk.push(pk_i);
        }
        Ok(PublicKey { a, pk })
    }

    /// Function key for y: the residues of y and sum_i y_i * sk_i in
    /// coefficient representation.
    pub fn derive_function_key(&self, y: &[i64], msk: &SecretKey<M>) -> Result<FunctionKey<M>> {
        if y.len() != self.params.l {
            return Err(IpfeError::InvalidDimensions(format!(
                "function vector length {} != l = {}",
                y.len(),
                self.params.l
            )));
        }
        for &v in y {
            check_bound(v, self.params.by)?;
        }
        msk.validate(self.params.l, &self.modulus)?;
        let m = &self.modulus;
        let y_enc = m.encode_scalars(y);
        let mut sk_y = m.zero_poly();
        for (i, sk_i) in msk.sk.iter().enumerate() {
            m.mul_acc(&mut sk_y, sk_i, &y_enc, i);
        }
        Ok(FunctionKey { y: y_enc, sk_y })
    }

    /// Encrypt a single vector of length l (a one-row matrix).
    pub fn encrypt_single<R: Rng + CryptoRng + ?Sized>(
        &self,
        x: &[i64],
        mpk: &PublicKey<M>,
        rng: &mut R,
    ) -> Result<Ciphertext<M>> {
        self.encrypt_rows(&[x.to_vec()], mpk, rng)
    }

    /// Encrypt up to n row vectors simultaneously under shared randomness.
    pub fn encrypt_multi<R: Rng + CryptoRng + ?Sized>(
        &self,
        x: &[Vec<i64>],
        mpk: &PublicKey<M>,
        rng: &mut R,
    ) -> Result<Ciphertext<M>> {
        self.encrypt_rows(x, mpk, rng)
    }

    fn encrypt_rows<R: Rng + CryptoRng + ?Sized>(
        &self,
        x: &[Vec<i64>],
        mpk: &PublicKey<M>,
        rng: &mut R,
    ) -> Result<Ciphertext<M>> {
        let l = self.params.l;
        if x.is_empty() || x.len() > self.params.n {
            return Err(IpfeError::InvalidDimensions(format!(
                "row count {} outside [1, {}]",
                x.len(),
                self.params.n
            )));
        }
        for row in x {
            if row.len() != l {
                return Err(IpfeError::InvalidDimensions(format!(
                    "row length {} != l = {l}",
                    row.len()
                )));
            }
            for &v in row {
                check_bound(v, self.params.bx)?;
            }
        }
        mpk.validate(l, &self.modulus)?;
        let m = &self.modulus;

        // One NTT(r) is shared by ct0 and every slot; this is what ties
        // the row dimension to the recovered products.
        let mut r = m.sample_gaussian(self.params.sigma2, self.sampler, rng);
        let f0 = m.sample_gaussian(self.params.sigma2, self.sampler, rng);
        m.forward_ntt(&mut r);

        let mut ct0 = m.pointwise_mul(&mpk.a, &r);
        m.inverse_ntt(&mut ct0);
        m.add_assign(&mut ct0, &f0);

        let mut ct = Vec::with_capacity(l);
        for i in 0..l {
            let f = m.sample_gaussian(self.params.sigma3, self.sampler, rng);
            let mut ct_i = m.pointwise_mul(&mpk.pk[i], &r);
            m.inverse_ntt(&mut ct_i);
            m.add_assign(&mut ct_i, &f);
            let x_poly = m.encode_column(x, i);
            m.add_assign(&mut ct_i, &x_poly);
            ct.push(ct_i);
        }
        Ok(Ciphertext {
            rows: x.len(),
            ct0,
            ct,
        })
    }

    /// Functional decryption: the inner product <x_row, y> for every
    /// encrypted row.
    pub fn decrypt(&self, ct: &Ciphertext<M>, sky: &FunctionKey<M>) -> Result<Vec<BigInt>> {
        ct.validate(self.params.l, &self.modulus)?;
        sky.validate(self.params.l, &self.modulus)?;
        let m = &self.modulus;
        let mut d_y = m.zero_poly();
        for (i, ct_i) in ct.ct.iter().enumerate() {
            m.mul_acc(&mut d_y, ct_i, &sky.y, i);
        }
        let c0sy = m.poly_mul(&ct.ct0, &sky.sk_y);
        m.sub_assign(&mut d_y, &c0sy);
        let lifted = m.lift_centered(&d_y);
        let scale = m.scale();
        Ok(lifted[..ct.rows]
            .iter()
            .map(|v| bigring::div_round_half_even(v, scale))
            .collect())
    }

    /// Full recovery of the plaintext matrix with the master secret key.
    pub fn decrypt_all(&self, ct: &Ciphertext<M>, msk: &SecretKey<M>) -> Result<Vec<Vec<i64>>> {
        ct.validate(self.params.l, &self.modulus)?;
        msk.validate(self.params.l, &self.modulus)?;
        let m = &self.modulus;
        let scale = m.scale();
        let mut columns = Vec::with_capacity(self.params.l);
        for (i, sk_i) in msk.sk.iter().enumerate() {
            let c0s = m.poly_mul(&ct.ct0, sk_i);
            let mut d = ct.ct[i].clone();
            m.sub_assign(&mut d, &c0s);
            columns.push(m.lift_centered(&d));
        }
        let mut x = Vec::with_capacity(ct.rows);
        for k in 0..ct.rows {
            let mut row = Vec::with_capacity(self.params.l);
            for column in &columns {
                let v = bigring::div_round_half_even(&column[k], scale);
                row.push(v.to_i64().ok_or(IpfeError::DecryptionOutOfRange)?);
            }
            x.push(row);
        }
        Ok(x)
    }
}

fn check_bound(v: i64, bound: i64) -> Result<()> {
    if v.unsigned_abs() > bound as u64 {
        return Err(IpfeError::InvalidBound { value: v, bound });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::{BigModulus, ChainModulus};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const SEC: u32 = 8;

    fn ints(v: &[i64]) -> Vec<BigInt> {
        v.iter().map(|&x| BigInt::from(x)).collect()
    }

    fn single_roundtrip<M: ModulusRepr>(x: &[i64], y: &[i64], bx: i64, by: i64, seed: u64) -> Vec<BigInt> {
        let scheme = RlweIpfe::<M>::generate(SEC, x.len(), 1, bx, by).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let msk = scheme.generate_secret_key(&mut rng);
        let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();
        let sky = scheme.derive_function_key(y, &msk).unwrap();
        let ct = scheme.encrypt_single(x, &mpk, &mut rng).unwrap();
        scheme.decrypt(&ct, &sky).unwrap()
    }

    #[test]
    fn test_single_vector_inner_product_chain() {
        let out = single_roundtrip::<ChainModulus>(&[1, 2, 3, 4], &[5, 6, 7, 8], 10, 10, 42);
        assert_eq!(out, ints(&[70]));
    }

    #[test]
    fn test_single_vector_inner_product_big() {
        let out = single_roundtrip::<BigModulus>(&[1, 2, 3, 4], &[5, 6, 7, 8], 10, 10, 42);
        assert_eq!(out, ints(&[70]));
    }

    #[test]
    fn test_negative_entries_chain() {
        let out = single_roundtrip::<ChainModulus>(&[-2, -2, -2], &[-1, -1, -1], 3, 3, 7);
        assert_eq!(out, ints(&[6]));
    }

    #[test]
    fn test_negative_entries_big() {
        let out = single_roundtrip::<BigModulus>(&[-2, -2, -2], &[-1, -1, -1], 3, 3, 7);
        assert_eq!(out, ints(&[6]));
    }

    #[test]
    fn test_basis_vector_selects_entry() {
        let x = [-3i64, 2, -1, 0, 3];
        let out = single_roundtrip::<ChainModulus>(&x, &[0, 0, 1, 0, 0], 3, 1, 11);
        assert_eq!(out, ints(&[x[2]]));
    }

    #[test]
    fn test_matrix_rows_chain() {
        let scheme = RlweIpfe::<ChainModulus>::generate(SEC, 2, 3, 6, 1).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let msk = scheme.generate_secret_key(&mut rng);
        let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();
        let sky = scheme.derive_function_key(&[1, 1], &msk).unwrap();
        let x = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
        let ct = scheme.encrypt_multi(&x, &mpk, &mut rng).unwrap();
        assert_eq!(ct.rows, 3);
        assert_eq!(scheme.decrypt(&ct, &sky).unwrap(), ints(&[3, 7, 11]));
    }

    #[test]
    fn test_matrix_rows_big() {
        let scheme = RlweIpfe::<BigModulus>::generate(SEC, 2, 3, 6, 1).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let msk = scheme.generate_secret_key(&mut rng);
        let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();
        let sky = scheme.derive_function_key(&[1, 1], &msk).unwrap();
        let x = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
        let ct = scheme.encrypt_multi(&x, &mpk, &mut rng).unwrap();
        assert_eq!(scheme.decrypt(&ct, &sky).unwrap(), ints(&[3, 7, 11]));
    }

    #[test]
    fn test_noise_budget_boundary() {
        // Both rows at the extreme bounds recover +/- l*bx*by exactly.
        let (l, bx, by) = (4usize, 10i64, 10i64);
        let scheme = RlweIpfe::<ChainModulus>::generate(SEC, l, 2, bx, by).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let msk = scheme.generate_secret_key(&mut rng);
        let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();
        let sky = scheme.derive_function_key(&vec![by; l], &msk).unwrap();
        let x = vec![vec![bx; l], vec![-bx; l]];
        let ct = scheme.encrypt_multi(&x, &mpk, &mut rng).unwrap();
        let expected = l as i64 * bx * by;
        assert_eq!(
            scheme.decrypt(&ct, &sky).unwrap(),
            ints(&[expected, -expected])
        );
    }

    #[test]
    fn test_decrypt_all_recovers_matrix() {
        let scheme = RlweIpfe::<ChainModulus>::generate(SEC, 6, 8, 5, 5).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1234);
        let msk = scheme.generate_secret_key(&mut rng);
        let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();
        let x: Vec<Vec<i64>> = (0..8)
            .map(|r| (0..6).map(|c| ((r * 7 + c * 3) % 11) as i64 - 5).collect())
            .collect();
        let ct = scheme.encrypt_multi(&x, &mpk, &mut rng).unwrap();
        assert_eq!(scheme.decrypt_all(&ct, &msk).unwrap(), x);
    }

    #[test]
    fn test_decrypt_all_recovers_matrix_big() {
        let scheme = RlweIpfe::<BigModulus>::generate(SEC, 3, 4, 5, 5).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1234);
        let msk = scheme.generate_secret_key(&mut rng);
        let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();
        let x = vec![vec![5, -5, 0], vec![-1, 2, -3], vec![4, 0, -4], vec![1, 1, 1]];
        let ct = scheme.encrypt_multi(&x, &mpk, &mut rng).unwrap();
        assert_eq!(scheme.decrypt_all(&ct, &msk).unwrap(), x);
    }

    #[test]
    fn test_facct_sampler_end_to_end() {
        let scheme = RlweIpfe::<ChainModulus>::generate(SEC, 4, 1, 10, 10)
            .unwrap()
            .with_sampler(GaussianSampler::Facct);
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let msk = scheme.generate_secret_key(&mut rng);
        let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();
        let sky = scheme.derive_function_key(&[5, 6, 7, 8], &msk).unwrap();
        let ct = scheme.encrypt_single(&[1, 2, 3, 4], &mpk, &mut rng).unwrap();
        assert_eq!(scheme.decrypt(&ct, &sky).unwrap(), ints(&[70]));
    }

    #[test]
    fn test_deterministic_given_rng() {
        let scheme = RlweIpfe::<ChainModulus>::generate(SEC, 3, 1, 4, 4).unwrap();
        let run = || {
            let mut rng = ChaCha20Rng::seed_from_u64(99);
            let msk = scheme.generate_secret_key(&mut rng);
            let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();
            let ct = scheme.encrypt_single(&[1, -2, 3], &mpk, &mut rng).unwrap();
            (msk, mpk, ct)
        };
        let (msk1, mpk1, ct1) = run();
        let (msk2, mpk2, ct2) = run();
        assert_eq!(msk1, msk2);
        assert_eq!(mpk1, mpk2);
        assert_eq!(ct1, ct2);
    }

    #[test]
    fn test_dimension_and_bound_validation() {
        let scheme = RlweIpfe::<ChainModulus>::generate(SEC, 3, 2, 4, 4).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let msk = scheme.generate_secret_key(&mut rng);
        let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();

        // Wrong y length, y out of bound.
        assert!(matches!(
            scheme.derive_function_key(&[1, 1], &msk),
            Err(IpfeError::InvalidDimensions(_))
        ));
        assert!(matches!(
            scheme.derive_function_key(&[1, 5, 1], &msk),
            Err(IpfeError::InvalidBound { .. })
        ));

        // Wrong x length, x out of bound, too many rows.
        assert!(scheme.encrypt_single(&[1, 2], &mpk, &mut rng).is_err());
        assert!(matches!(
            scheme.encrypt_single(&[1, 2, -5], &mpk, &mut rng),
            Err(IpfeError::InvalidBound { .. })
        ));
        let too_many: Vec<Vec<i64>> = vec![vec![0, 0, 0]; scheme.params.n + 1];
        assert!(scheme.encrypt_multi(&too_many, &mpk, &mut rng).is_err());

        // Mismatched key material is rejected before any arithmetic.
        let other = RlweIpfe::<ChainModulus>::generate(SEC, 2, 1, 4, 4).unwrap();
        let mut rng2 = ChaCha20Rng::seed_from_u64(6);
        let foreign = other.generate_secret_key(&mut rng2);
        assert!(scheme.generate_public_key(&foreign, &mut rng).is_err());
    }
}
