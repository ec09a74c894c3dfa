use rand::{Rng, distr::Alphanumeric};
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to compute bcrypt hash with cost {cost}"))]
    Bcrypt { source: bcrypt::BcryptError, cost: u32 },
}

/// bcrypt with an explicit cost factor, constructed once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, Error> {
        bcrypt::hash(plaintext, self.cost).context(BcryptSnafu { cost: self.cost })
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

/// Generates an alphanumeric secret value of `size` characters.
pub fn generate_plaintext(size: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(size)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_length_and_charset() {
        let value = generate_plaintext(32);
        assert_eq!(value.len(), 32);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(value, generate_plaintext(32));
    }

    #[test]
    fn invalid_cost() {
        assert!(PasswordHasher::new(2).hash("foo").is_err());
    }
}
