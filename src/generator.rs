//! Random password generation.
//!
//! Characters are drawn independently and uniformly from the union of
//! the selected classes using the thread-local CSPRNG.  No class is
//! guaranteed to appear; a short password may well be all lowercase.

use rand::Rng;

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*";

/// Which character classes to draw from, and how many characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordOptions {
    pub length: usize,
    pub uppercase: bool,
    pub lowercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            length: 16,
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
        }
    }
}

impl PasswordOptions {
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// The candidate alphabet; letters + digits when nothing is selected.
    pub fn charset(&self) -> Vec<char> {
        let mut chars = String::new();
        if self.lowercase {
            chars.push_str(LOWERCASE);
        }
        if self.uppercase {
            chars.push_str(UPPERCASE);
        }
        if self.digits {
            chars.push_str(DIGITS);
        }
        if self.symbols {
            chars.push_str(SYMBOLS);
        }
        if chars.is_empty() {
            chars.push_str(LOWERCASE);
            chars.push_str(UPPERCASE);
            chars.push_str(DIGITS);
        }
        chars.chars().collect()
    }
}

/// Generate a password according to `options`.
pub fn generate_password(options: &PasswordOptions) -> String {
    let charset = options.charset();
    let mut rng = rand::rng();
    (0..options.length)
        .map(|_| charset[rng.random_range(0..charset.len())])
        .collect()
}
