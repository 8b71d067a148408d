//! Random opaque tokens for invitation links and similar one-time secrets.

use crate::envelope::fill_random;
use crate::error::Error;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use zeroize::Zeroizing;

/// Number of random bytes behind a token.
pub const TOKEN_BYTES: usize = 32;

/// Generates a URL-safe token from [`TOKEN_BYTES`] bytes of OS randomness.
///
/// # Errors
///
/// Returns `Error::SecureRandomUnavailable` if the OS random source fails.
pub fn random_token() -> Result<String, Error> {
    let mut bytes = Zeroizing::new([0u8; TOKEN_BYTES]);
    fill_random(bytes.as_mut())?;
    Ok(URL_SAFE.encode(bytes.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_shape() {
        let token = random_token().unwrap();

        // 32 bytes -> 44 base64 characters including one padding byte
        assert_eq!(token.len(), 44);
        assert!(token.ends_with('='));
        assert!(!token.contains('+') && !token.contains('/'));
        assert_eq!(URL_SAFE.decode(&token).unwrap().len(), TOKEN_BYTES);
    }

    #[test]
    fn test_tokens_unique() {
        let tokens: HashSet<_> = (0..64).map(|_| random_token().unwrap()).collect();
        assert_eq!(tokens.len(), 64);
    }
}
