// Utility functions

use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::Rng;
use sha2::{Digest, Sha256};

const BASE36_UPPER: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Hash a bearer token for constant-length comparison
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate an opaque record id
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Random uppercase base-36 string of `len` characters
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36_UPPER[rng.gen_range(0..BASE36_UPPER.len())] as char)
        .collect()
}

/// Hash an organization password into a PHC string
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("secret123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("secret124", &hash));
        assert!(!verify_password("secret123", "not-a-hash"));
    }

    #[test]
    fn base36_alphabet_only() {
        let s = random_base36(64);
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let h = hash_token("admin");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_token("admin"));
        assert_ne!(h, hash_token("admin2"));
    }
}
