//! Password recipes for generated secrets
//!
//! A [`PasswordRecipe`] describes the shape of one generated password: total
//! length, how many digits and symbols it must contain, and whether upper
//! case letters or repeated characters are allowed.
//!
//! # Defaulting
//!
//! - `length` defaults to 64
//! - `numDigits` defaults to 10 when 10 digits fit in the length
//! - `numSymbols` defaults to 10 when the digits plus 10 symbols fit in the length

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

const DEFAULT_LENGTH: usize = 64;
const DEFAULT_CLASS_COUNT: usize = 10;

const LOWER_LETTERS: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER_LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "~!@#$%^&*()_+`-={}|[]\\:\"<>?,./";

// =============================================================================
// RECIPE
// =============================================================================

/// Parameters of a single password generation request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRecipe {
    /// Key of the generated value in the secret data
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_digits: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_symbols: Option<usize>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_upper: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_repeat: bool,
}

impl PasswordRecipe {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Fill unset fields with their defaults
    pub fn with_defaults(&self) -> Self {
        let length = self.length.unwrap_or(DEFAULT_LENGTH);
        let num_digits = self.num_digits.unwrap_or(if DEFAULT_CLASS_COUNT <= length {
            DEFAULT_CLASS_COUNT
        } else {
            0
        });
        let num_symbols = self
            .num_symbols
            .unwrap_or(if num_digits + DEFAULT_CLASS_COUNT <= length {
                DEFAULT_CLASS_COUNT
            } else {
                0
            });

        Self {
            key: self.key.clone(),
            length: Some(length),
            num_digits: Some(num_digits),
            num_symbols: Some(num_symbols),
            no_upper: self.no_upper,
            allow_repeat: self.allow_repeat,
        }
    }
}

/// Alphabet overrides for the password generator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_letters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_letters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<String>,
}

// =============================================================================
// GENERATOR
// =============================================================================

/// Password generator
#[derive(Debug)]
pub struct PasswordGenerator {
    lower: Vec<char>,
    upper: Vec<char>,
    digits: Vec<char>,
    symbols: Vec<char>,
    rng: StdRng,
}

impl PasswordGenerator {
    /// Create a generator with the default alphabets
    pub fn new() -> Self {
        Self::with_options(&PasswordOptions::default())
    }

    /// Create a generator with alphabet overrides
    pub fn with_options(options: &PasswordOptions) -> Self {
        let chars = |o: &Option<String>, d: &str| o.as_deref().unwrap_or(d).chars().collect();
        Self {
            lower: chars(&options.lower_letters, LOWER_LETTERS),
            upper: chars(&options.upper_letters, UPPER_LETTERS),
            digits: chars(&options.digits, DIGITS),
            symbols: chars(&options.symbols, SYMBOLS),
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Create a deterministic generator (for tests)
    pub fn seeded(options: &PasswordOptions, seed: u64) -> Self {
        let mut generator = Self::with_options(options);
        generator.rng = StdRng::seed_from_u64(seed);
        generator
    }

    /// Generate a password for a recipe (defaults are applied first)
    pub fn generate(&mut self, recipe: &PasswordRecipe) -> Result<String> {
        let recipe = recipe.with_defaults();
        let length = recipe.length.unwrap_or(DEFAULT_LENGTH);
        let num_digits = recipe.num_digits.unwrap_or(0);
        let num_symbols = recipe.num_symbols.unwrap_or(0);

        let fail = |message: String| CoreError::PasswordRecipe {
            key: recipe.key.clone(),
            message,
        };

        if num_digits + num_symbols > length {
            return Err(fail(format!(
                "{} digits and {} symbols exceed the length {}",
                num_digits, num_symbols, length
            )));
        }

        let mut letters = self.lower.clone();
        if !recipe.no_upper {
            letters.extend(self.upper.iter().copied());
        }
        let num_letters = length - num_digits - num_symbols;

        if !recipe.allow_repeat {
            for (needed, available, class) in [
                (num_digits, self.digits.len(), "digits"),
                (num_symbols, self.symbols.len(), "symbols"),
                (num_letters, letters.len(), "letters"),
            ] {
                if needed > available {
                    return Err(fail(format!(
                        "{} {} requested but only {} distinct are available without repeats",
                        needed, class, available
                    )));
                }
            }
        }

        let digits = self.digits.clone();
        let symbols = self.symbols.clone();

        let mut result: Vec<char> = Vec::with_capacity(length);
        for (count, alphabet) in [
            (num_letters, &letters),
            (num_digits, &digits),
            (num_symbols, &symbols),
        ] {
            for _ in 0..count {
                let c = self.pick(alphabet, &result, recipe.allow_repeat, &recipe.key)?;
                let position = self.rng.random_range(0..=result.len());
                result.insert(position, c);
            }
        }

        Ok(result.into_iter().collect())
    }

    fn pick(&mut self, alphabet: &[char], used: &[char], allow_repeat: bool, key: &str) -> Result<char> {
        let candidates: Vec<char> = if allow_repeat {
            alphabet.to_vec()
        } else {
            alphabet.iter().copied().filter(|c| !used.contains(c)).collect()
        };

        if candidates.is_empty() {
            return Err(CoreError::PasswordRecipe {
                key: key.to_string(),
                message: "alphabet exhausted".to_string(),
            });
        }
        Ok(candidates[self.rng.random_range(0..candidates.len())])
    }
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(s: &str, alphabet: &str) -> usize {
        s.chars().filter(|c| alphabet.contains(*c)).count()
    }

    #[test]
    fn test_defaults() {
        let r = PasswordRecipe::new("password").with_defaults();
        assert_eq!(r.length, Some(64));
        assert_eq!(r.num_digits, Some(10));
        assert_eq!(r.num_symbols, Some(10));

        let short = PasswordRecipe {
            length: Some(15),
            ..PasswordRecipe::new("pin")
        }
        .with_defaults();
        assert_eq!(short.num_digits, Some(10));
        assert_eq!(short.num_symbols, Some(0));

        let tiny = PasswordRecipe {
            length: Some(8),
            ..PasswordRecipe::new("pin")
        }
        .with_defaults();
        assert_eq!(tiny.num_digits, Some(0));
        assert_eq!(tiny.num_symbols, Some(0));
    }

    #[test]
    fn test_generate_honors_recipe() {
        let mut generator = PasswordGenerator::seeded(&PasswordOptions::default(), 7);
        let recipe = PasswordRecipe {
            length: Some(32),
            num_digits: Some(5),
            num_symbols: Some(3),
            ..PasswordRecipe::new("password")
        };

        let password = generator.generate(&recipe).unwrap();
        assert_eq!(password.chars().count(), 32);
        assert_eq!(count(&password, DIGITS), 5);
        assert_eq!(count(&password, SYMBOLS), 3);

        let mut seen = std::collections::HashSet::new();
        assert!(password.chars().all(|c| seen.insert(c)), "no repeats by default");
    }

    #[test]
    fn test_no_upper() {
        let mut generator = PasswordGenerator::seeded(&PasswordOptions::default(), 1);
        let recipe = PasswordRecipe {
            length: Some(20),
            no_upper: true,
            ..PasswordRecipe::new("password")
        };
        let password = generator.generate(&recipe).unwrap();
        assert_eq!(count(&password, UPPER_LETTERS), 0);
    }

    #[test]
    fn test_impossible_recipes_fail() {
        let mut generator = PasswordGenerator::new();

        let too_many = PasswordRecipe {
            length: Some(5),
            num_digits: Some(4),
            num_symbols: Some(4),
            ..PasswordRecipe::new("a")
        };
        assert!(generator.generate(&too_many).is_err());

        let repeats = PasswordRecipe {
            length: Some(11),
            num_digits: Some(11),
            num_symbols: Some(0),
            ..PasswordRecipe::new("b")
        };
        assert!(generator.generate(&repeats).is_err());

        let allowed = PasswordRecipe {
            allow_repeat: true,
            ..repeats
        };
        assert_eq!(generator.generate(&allowed).unwrap().len(), 11);
    }

    #[test]
    fn test_custom_alphabet() {
        let options = PasswordOptions {
            symbols: Some("-_".to_string()),
            ..Default::default()
        };
        let mut generator = PasswordGenerator::seeded(&options, 3);
        let recipe = PasswordRecipe {
            length: Some(12),
            num_digits: Some(2),
            num_symbols: Some(2),
            ..PasswordRecipe::new("a")
        };
        let password = generator.generate(&recipe).unwrap();
        assert_eq!(count(&password, "-_"), 2);
    }
}
