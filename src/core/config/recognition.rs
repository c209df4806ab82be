//! Recognizer configuration: the character vocabulary and input geometry.
//!
//! The configuration is an external JSON resource shipped next to the
//! recognition models. When it cannot be fetched or parsed the built-in
//! defaults apply.

use super::ConfigValidator;
use crate::core::constants::*;
use crate::core::errors::{OCRError, OcrResult};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CHARSET: Lazy<String> = Lazy::new(|| {
    let mut charset = String::new();
    charset.extend((0x21u32..=0x7E).filter_map(char::from_u32));
    charset.extend((0x3041u32..=0x3096).filter_map(char::from_u32));
    charset.extend((0x30A1u32..=0x30FA).filter_map(char::from_u32));
    charset.extend("ー・、。「」『』（）〔〕［］｛｝〈〉《》【】〇々〆".chars());
    charset.extend("一二三四五六七八九十百千万億円年月日時分".chars());
    charset
});

/// Returns the built-in character vocabulary.
pub fn default_charset() -> &'static str {
    &DEFAULT_CHARSET
}

/// Vocabulary and input geometry shared by the three cascade recognizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Characters in vocabulary order. Model index `i` (for `i > 3`) maps to
    /// the `i - 1`th character.
    #[serde(default = "RecognizerConfig::default_charset")]
    pub charset: String,

    /// Input height shared by every recognizer.
    #[serde(default = "RecognizerConfig::default_input_height")]
    pub input_height: u32,

    /// Input widths of the narrow, medium and wide recognizers.
    #[serde(default = "RecognizerConfig::default_input_widths")]
    pub input_widths: [u32; 3],

    /// Maximum number of sequence positions read while decoding.
    #[serde(default = "RecognizerConfig::default_max_length")]
    pub max_length: usize,
}

impl RecognizerConfig {
    /// Creates a configuration with the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from its JSON text.
    pub fn from_json_slice(bytes: &[u8]) -> OcrResult<Self> {
        let config: Self = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces the vocabulary.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Sets the maximum decode length.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Returns the vocabulary as a character vector.
    pub fn vocabulary(&self) -> Vec<char> {
        self.charset.chars().collect()
    }

    fn default_charset() -> String {
        DEFAULT_CHARSET.clone()
    }

    fn default_input_height() -> u32 {
        DEFAULT_REC_INPUT_HEIGHT
    }

    fn default_input_widths() -> [u32; 3] {
        DEFAULT_REC_WIDTHS
    }

    fn default_max_length() -> usize {
        DEFAULT_REC_MAX_LENGTH
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            charset: Self::default_charset(),
            input_height: Self::default_input_height(),
            input_widths: Self::default_input_widths(),
            max_length: Self::default_max_length(),
        }
    }
}

impl ConfigValidator for RecognizerConfig {
    fn validate(&self) -> OcrResult<()> {
        if self.charset.is_empty() {
            return Err(OCRError::config_error("recognizer charset is empty"));
        }
        if self.input_height == 0 || self.input_widths.contains(&0) {
            return Err(OCRError::config_error(format!(
                "recognizer input dimensions must be positive, got height {} widths {:?}",
                self.input_height, self.input_widths
            )));
        }
        if self.max_length == 0 {
            return Err(OCRError::config_error("max_length must be greater than 0"));
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}
