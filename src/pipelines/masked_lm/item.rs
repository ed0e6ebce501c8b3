use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::pipelines::encoding::{Encoded, Encoder, EncodingError};

/// A masked chunk of text
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// The tokenized chunk, with masked positions replaced
    pub encoded: Encoded,

    /// The original id at masked positions, the padding id elsewhere
    pub labels: Vec<i64>,

    /// 1 at masked positions, 0 elsewhere
    pub weights: Vec<f32>,
}

/// How tokens are picked for prediction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Masking {
    /// Mask every word piece of a word together
    pub whole_word: bool,

    /// Upper bound on masked positions per sequence
    pub max_predictions: usize,

    /// Fraction of tokens to mask
    pub probability: f64,
}

impl Masking {
    /// The number of positions to mask in a sequence of `len` word pieces
    pub fn num_to_predict(&self, len: usize) -> usize {
        let wanted = (len as f64 * self.probability).round() as usize;

        self.max_predictions.min(wanted.max(1))
    }
}

/// Tokenize a chunk and mask it. Picked positions become `[MASK]` 80% of the time, stay
/// unchanged 10% of the time and take a random vocabulary id otherwise.
pub fn mask_text<R: Rng>(
    encoder: &Encoder,
    text: &str,
    max_seq_length: usize,
    masking: Masking,
    rng: &mut R,
) -> Result<Feature, EncodingError> {
    if max_seq_length < 3 {
        return Err(EncodingError::SequenceTooShort(max_seq_length));
    }

    let mut pieces = encoder.tokenize(text)?;
    pieces.truncate(max_seq_length.saturating_sub(2));

    let ids: Vec<i64> = pieces.iter().map(|(id, _)| *id).collect();
    let mut encoded = encoder.wrap(ids, max_seq_length);

    let mut labels = vec![encoder.pad_id; max_seq_length];
    let mut weights = vec![0.0; max_seq_length];

    let mut candidates = word_groups(&pieces, masking.whole_word);
    candidates.shuffle(rng);

    let limit = masking.num_to_predict(pieces.len());
    let vocab_size = encoder.vocab_size().max(1) as i64;
    let mut masked = 0;

    for group in candidates {
        if masked >= limit {
            break;
        }

        if masked + group.len() > limit {
            continue;
        }

        for position in group {
            let original = encoded.input_ids[position];

            encoded.input_ids[position] = if rng.gen_bool(0.8) {
                encoder.mask_id
            } else if rng.gen_bool(0.5) {
                original
            } else {
                rng.gen_range(0..vocab_size)
            };

            labels[position] = original;
            weights[position] = 1.0;
            masked += 1;
        }
    }

    Ok(Feature {
        encoded,
        labels,
        weights,
    })
}

/// Positions of the word pieces in the wrapped sequence, grouped by word when `whole_word` is set:
/// a `##` continuation joins the group of the piece before it
pub fn word_groups(pieces: &[(i64, String)], whole_word: bool) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::with_capacity(pieces.len());

    for (index, (_, piece)) in pieces.iter().enumerate() {
        // Offset by one for [CLS]
        let position = index + 1;

        match groups.last_mut() {
            Some(group) if whole_word && piece.starts_with("##") => group.push(position),
            _ => groups.push(vec![position]),
        }
    }

    groups
}
