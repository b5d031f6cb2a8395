use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::CryptoError;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

const SCHEME: &str = "pbkdf2-sha256";

/// Hash a password into `pbkdf2-sha256$<iterations>$<salt>$<hash>`.
pub fn hash_password(password: &str, iterations: u32) -> String {
    let salt = generate_salt();
    let mut derived = derive(password, &salt, iterations);
    let encoded = format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD.encode(salt),
        STANDARD.encode(derived)
    );
    derived.zeroize();
    encoded
}

/// Check a password against a stored hash in constant time.
///
/// `Ok(false)` on mismatch, `Err` only when the stored value cannot be parsed.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CryptoError> {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(CryptoError::MalformedHash);
    };

    let iterations: u32 = iterations.parse().map_err(|_| CryptoError::MalformedHash)?;
    let salt = STANDARD.decode(salt).map_err(|_| CryptoError::MalformedHash)?;
    let expected = STANDARD
        .decode(expected)
        .map_err(|_| CryptoError::MalformedHash)?;
    if iterations == 0 || expected.len() != HASH_LENGTH {
        return Err(CryptoError::MalformedHash);
    }

    let mut derived = derive(password, &salt, iterations);
    let matches = derived[..].ct_eq(&expected[..]).unwrap_u8() == 1;
    derived.zeroize();
    Ok(matches)
}

/// Run one derivation and discard it. Used when there is no stored hash to
/// check against, so a miss costs the same as a mismatch.
pub fn burn_password_check(password: &str, iterations: u32) {
    let mut derived = derive(password, &[0u8; SALT_LENGTH], iterations.max(1));
    derived.zeroize();
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn correct_password_verifies() {
        let stored = hash_password("pw123", FAST);
        assert!(verify_password("pw123", &stored).unwrap());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let stored = hash_password("pw123", FAST);
        assert!(!verify_password("pw124", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash_password("pw123", FAST), hash_password("pw123", FAST));
    }

    #[test]
    fn stored_format_records_iterations() {
        let stored = hash_password("pw123", FAST);
        assert!(stored.starts_with("pbkdf2-sha256$1000$"));
        assert_eq!(stored.split('$').count(), 4);
    }

    #[test]
    fn garbage_hash_is_malformed() {
        for stored in ["", "hash", "pbkdf2-sha256$x$aa$bb", "bcrypt$1$aa$bb", "pbkdf2-sha256$1$!!$!!"] {
            assert!(matches!(
                verify_password("pw", stored),
                Err(CryptoError::MalformedHash)
            ));
        }
    }

    #[test]
    fn generate_salt_is_random() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn burn_check_accepts_any_input() {
        burn_password_check("", FAST);
        burn_password_check("pw123", 0);
    }
}
