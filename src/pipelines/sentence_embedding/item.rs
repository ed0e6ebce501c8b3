use serde::{Deserialize, Serialize};

use crate::{
    datasets::{documents, pairs},
    pipelines::encoding::{Encoded, EncodingError, Encoder},
};

/// One encoded training sentence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// The tokenized sentence
    pub encoded: Encoded,
}

/// Two encoded sentences and their gold similarity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    /// The first sentence
    pub first: Encoded,

    /// The second sentence
    pub second: Encoded,

    /// The gold similarity score
    pub score: f32,
}

/// Encode a document as a single training sentence
pub fn encode_document(
    encoder: &Encoder,
    item: &documents::Item,
    max_seq_length: usize,
) -> Result<Sentence, EncodingError> {
    Ok(Sentence {
        encoded: encoder.encode_text(&item.content, max_seq_length)?,
    })
}

/// Encode both sentences of a labelled pair
pub fn encode_pair(
    encoder: &Encoder,
    item: &pairs::Item,
    max_seq_length: usize,
) -> Result<Pair, EncodingError> {
    Ok(Pair {
        first: encoder.encode_text(&item.first, max_seq_length)?,
        second: encoder.encode_text(&item.second, max_seq_length)?,
        score: item.score,
    })
}

/// The sentences of labelled pairs, used to follow the contrastive loss on validation data
pub fn pair_sentences(pairs: &[Pair]) -> Vec<Sentence> {
    pairs
        .iter()
        .flat_map(|pair| [pair.first.clone(), pair.second.clone()])
        .map(|encoded| Sentence { encoded })
        .collect()
}
