//! Greedy decoding of recognizer logits into text.
//!
//! Index 0 ends the sequence, indices 1 to 3 are control tokens, and any other
//! index `i` maps to `vocabulary[i - 1]`. Consecutive repeats of the same index
//! collapse to one character.

use crate::core::constants::{CONTROL_TOKENS, EOS_TOKEN, NOMINAL_REC_CONFIDENCE};
use crate::core::errors::{OCRError, OcrResult};
use ndarray::ArrayView2;

/// Greedy decoder over a fixed character vocabulary.
#[derive(Debug, Clone)]
pub struct GreedyDecoder {
    vocabulary: Vec<char>,
    max_length: usize,
}

impl GreedyDecoder {
    /// Creates a decoder that reads at most `max_length` positions.
    pub fn new(vocabulary: Vec<char>, max_length: usize) -> Self {
        Self {
            vocabulary,
            max_length,
        }
    }

    /// Number of characters in the vocabulary.
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Decodes a sequence of token indices.
    pub fn decode_indices(&self, indices: impl IntoIterator<Item = usize>) -> String {
        let mut text = String::new();
        let mut prev: Option<usize> = None;

        for idx in indices.into_iter().take(self.max_length) {
            if idx == EOS_TOKEN {
                break;
            }
            let repeated = prev == Some(idx);
            prev = Some(idx);
            if repeated || CONTROL_TOKENS.contains(&idx) {
                continue;
            }
            if let Some(&ch) = self.vocabulary.get(idx - 1) {
                text.push(ch);
            }
        }

        text.trim().to_string()
    }

    /// Decodes a `[sequence_length, vocab_size]` logits matrix by per-position arg-max.
    ///
    /// Returns the text and the nominal confidence.
    pub fn decode_logits(&self, logits: ArrayView2<'_, f32>) -> OcrResult<(String, f32)> {
        if logits.ncols() == 0 {
            return Err(OCRError::decoding("logits have an empty vocabulary axis"));
        }
        let indices = logits.rows().into_iter().map(|row| argmax(row.iter().copied()));
        Ok((self.decode_indices(indices), NOMINAL_REC_CONFIDENCE))
    }
}

fn argmax(values: impl Iterator<Item = f32>) -> usize {
    let mut best_idx = 0;
    let mut best = f32::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best {
            best = v;
            best_idx = i;
        }
    }
    best_idx
}
