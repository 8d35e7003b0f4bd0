//! Link share token generation.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of generated link tokens.
pub const TOKEN_LENGTH: usize = 15;

/// Generates random alphanumeric tokens for link shares.
#[derive(Debug, Clone, Default)]
pub struct TokenGenerator;

impl TokenGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let generator = TokenGenerator::new();
        let token = generator.generate();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generator.generate());
    }
}
