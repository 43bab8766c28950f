//! File persistence for params, keys, and ciphertexts.
//!
//! Objects are stored as JSON records. Parameters carry only the prime
//! description; the modulus tables are rebuilt when a scheme instance is
//! constructed from loaded parameters.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Write any persisted object as JSON.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok(())
}

/// Read back an object written by [`save_json`].
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphertext::{Ciphertext, SecretKey};
    use crate::modulus::{BigModulus, ChainModulus};
    use crate::params::IpfeParams;
    use crate::scheme::RlweIpfe;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::path::PathBuf;

    struct TempFile(PathBuf);

    impl TempFile {
        fn new(name: &str) -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!("ringfe-test-{}-{name}", std::process::id()));
            Self(path)
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_params_roundtrip_chain() {
        let params = IpfeParams::<ChainModulus>::generate(8, 3, 1, 4, 4).unwrap();
        let tmp = TempFile::new("params-chain.json");
        save_json(&tmp.0, &params).unwrap();
        let loaded: IpfeParams<ChainModulus> = load_json(&tmp.0).unwrap();
        assert_eq!(params, loaded);
        // The rebuilt modulus must be usable.
        loaded.modulus().unwrap();
    }

    #[test]
    fn test_params_roundtrip_big() {
        let params = IpfeParams::<BigModulus>::generate(8, 3, 1, 4, 4).unwrap();
        let tmp = TempFile::new("params-big.json");
        save_json(&tmp.0, &params).unwrap();
        let loaded: IpfeParams<BigModulus> = load_json(&tmp.0).unwrap();
        assert_eq!(params, loaded);
    }

    #[test]
    fn test_key_and_ciphertext_roundtrip() {
        let scheme = RlweIpfe::<ChainModulus>::generate(8, 3, 1, 4, 4).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let msk = scheme.generate_secret_key(&mut rng);
        let mpk = scheme.generate_public_key(&msk, &mut rng).unwrap();
        let sky = scheme.derive_function_key(&[1, -2, 3], &msk).unwrap();
        let ct = scheme.encrypt_single(&[4, 0, -4], &mpk, &mut rng).unwrap();

        let tmp = TempFile::new("msk.json");
        save_json(&tmp.0, &msk).unwrap();
        let msk2: SecretKey<ChainModulus> = load_json(&tmp.0).unwrap();
        assert_eq!(msk, msk2);

        let tmp = TempFile::new("ct.json");
        save_json(&tmp.0, &ct).unwrap();
        let ct2: Ciphertext<ChainModulus> = load_json(&tmp.0).unwrap();
        assert_eq!(ct, ct2);

        // Reloaded material still decrypts.
        assert_eq!(
            scheme.decrypt(&ct2, &sky).unwrap(),
            scheme.decrypt(&ct, &sky).unwrap()
        );
        assert_eq!(scheme.decrypt_all(&ct2, &msk2).unwrap(), vec![vec![4, 0, -4]]);
    }
}
