//! One-time code generation.

use rand::Rng;
use thiserror::Error;

/// Shortest code accepted by the API.
pub const MIN_CODE_LENGTH: usize = 4;
/// Longest code accepted by the API.
pub const MAX_CODE_LENGTH: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "code length must be between {} and {}, got {0}",
    MIN_CODE_LENGTH,
    MAX_CODE_LENGTH
)]
pub struct CodeLengthError(pub usize);

/// Generates fixed-width, zero-padded decimal codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeGenerator {
    length: usize,
}

impl CodeGenerator {
    pub fn new(length: usize) -> Result<Self, CodeLengthError> {
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length) {
            return Err(CodeLengthError(length));
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn generate(&self) -> String {
        let upper = 10u32.pow(self.length as u32);
        let value = rand::thread_rng().gen_range(0..upper);
        format!("{:0width$}", value, width = self.length)
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self {
            length: MIN_CODE_LENGTH,
        }
    }
}
