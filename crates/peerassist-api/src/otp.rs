//! One-time codes. Only the digest is stored; the plaintext goes out by mail.

use rand::Rng;
use sha2::{Digest, Sha256};

pub const PASSWORD_RESET_TTL_MINUTES: i64 = 10;
pub const TASK_COMPLETION_TTL_MINUTES: i64 = 30;

/// Six-digit, zero-padded code from the thread-local CSPRNG.
pub fn generate() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

pub fn digest(code: &str) -> String {
    hex::encode(Sha256::digest(code.trim().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn digest_ignores_surrounding_whitespace() {
        assert_eq!(digest("012345"), digest(" 012345\n"));
        assert_ne!(digest("012345"), digest("012346"));
        assert_eq!(digest("012345").len(), 64);
    }
}
