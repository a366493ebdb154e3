//! Password hashing.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

const SCHEME: &str = "sha256";

/// Hashes and verifies passwords.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;

    fn verify(&self, password: &str, hashed: &str) -> bool;
}

/// Salted SHA-256, encoded as `sha256$<salt>$<hex digest>`.
///
/// Suitable for development and tests; production deployments should plug
/// in a dedicated password KDF through [`PasswordHasher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltedSha256;

impl SaltedSha256 {
    fn digest(salt: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"$");
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl PasswordHasher for SaltedSha256 {
    fn hash(&self, password: &str) -> String {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = Self::digest(&salt, password);
        format!("{SCHEME}${salt}${digest}")
    }

    fn verify(&self, password: &str, hashed: &str) -> bool {
        let mut parts = hashed.splitn(3, '$');
        let (Some(SCHEME), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let actual = Self::digest(salt, password);
        actual.len() == expected.len() && actual.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = SaltedSha256;
        let hashed = hasher.hash("correct horse");
        assert!(hashed.starts_with("sha256$"));
        assert!(hasher.verify("correct horse", &hashed));
        assert!(!hasher.verify("battery staple", &hashed));
    }

    #[test]
    fn test_salt_differs_per_hash() {
        let hasher = SaltedSha256;
        assert_ne!(hasher.hash("same"), hasher.hash("same"));
    }

    #[test]
    fn test_tampered_digest_rejected() {
        let hasher = SaltedSha256;
        let hashed = hasher.hash("correct horse");
        let mut tampered = hashed.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        assert!(!hasher.verify("correct horse", &tampered));
        assert!(!hasher.verify("correct horse", &hashed[..hashed.len() - 1]));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let hasher = SaltedSha256;
        assert!(!hasher.verify("x", ""));
        assert!(!hasher.verify("x", "md5$salt$abc"));
        assert!(!hasher.verify("x", "sha256$salt"));
    }
}
