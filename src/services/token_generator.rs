//! Random token strings for QR codes.
//!
//! Tokens may have to be typed by hand when a camera fails, so the
//! alphabet leaves out characters that are easy to confuse (`0`/`O`, `1`/`I`).

use rand::Rng;

/// Upper-case letters and digits without `0`, `O`, `1` and `I`.
pub const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in every token.
pub const TOKEN_LENGTH: usize = 12;

/// Source of candidate token strings.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Draws tokens from the thread-local CSPRNG.
///
/// 32 symbols over 12 positions gives 2^60 possible tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..TOKEN_LENGTH)
            .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
            .collect()
    }
}

/// Whether `candidate` could have been produced by the generator.
pub fn is_well_formed(candidate: &str) -> bool {
    candidate.len() == TOKEN_LENGTH && candidate.bytes().all(|b| TOKEN_ALPHABET.contains(&b))
}

/// Normalize a presented token: surrounding whitespace dropped, upper-cased.
pub fn normalize(presented: &str) -> String {
    presented.trim().to_ascii_uppercase()
}
