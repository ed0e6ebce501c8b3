use std::path::Path;

use serde::{Deserialize, Serialize};
use tokenizers::{
    models::wordpiece::WordPiece, normalizers::bert::BertNormalizer,
    pre_tokenizers::bert::BertPreTokenizer, Tokenizer,
};

use crate::utils::hugging_face::ModelFiles;

/// The classifier token, first in every sequence
pub static CLS_TOKEN: &str = "[CLS]";

/// The separator token, last in every sequence
pub static SEP_TOKEN: &str = "[SEP]";

/// The padding token
pub static PAD_TOKEN: &str = "[PAD]";

/// The token for characters outside the vocabulary
pub static UNK_TOKEN: &str = "[UNK]";

/// The masked language model token
pub static MASK_TOKEN: &str = "[MASK]";

/// A sequence padded to a fixed length
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoded {
    /// Token ids, `[CLS] tokens [SEP]` followed by padding
    pub input_ids: Vec<i64>,

    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<i64>,

    /// Segment ids, all 0 for single sentences
    pub token_type_ids: Vec<i64>,

    /// The number of real tokens, including `[CLS]` and `[SEP]`
    pub seqlen: usize,
}

impl Encoded {
    /// The padded length
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Whether the sequence has no positions at all
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Turns text into fixed-length id sequences for a BERT vocabulary
#[derive(Clone)]
pub struct Encoder {
    tokenizer: Tokenizer,
    do_lower_case: bool,

    /// Id of `[CLS]`
    pub cls_id: i64,

    /// Id of `[SEP]`
    pub sep_id: i64,

    /// Id of `[PAD]`
    pub pad_id: i64,

    /// Id of `[UNK]`
    pub unk_id: i64,

    /// Id of `[MASK]`
    pub mask_id: i64,
}

impl Encoder {
    /// Wrap a tokenizer, resolving the special token ids. Padding and truncation configured in a
    /// tokenizer file are turned off, [`Encoder::wrap`] applies them.
    pub fn new(mut tokenizer: Tokenizer, do_lower_case: bool) -> Result<Self, EncodingError> {
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| EncodingError::Tokenizer(e.to_string()))?;

        let special = |token: &'static str| {
            tokenizer
                .token_to_id(token)
                .map(i64::from)
                .ok_or(EncodingError::MissingToken(token))
        };

        Ok(Self {
            cls_id: special(CLS_TOKEN)?,
            sep_id: special(SEP_TOKEN)?,
            pad_id: special(PAD_TOKEN)?,
            unk_id: special(UNK_TOKEN)?,
            mask_id: special(MASK_TOKEN)?,
            tokenizer,
            do_lower_case,
        })
    }

    /// Load the tokenizer of a model: its `tokenizer.json`, else its BERT `vocab.txt`, else the
    /// tokenizer published on the Hugging Face Hub under the model name
    pub fn load(
        files: &ModelFiles,
        model_name: &str,
        do_lower_case: bool,
    ) -> Result<Self, EncodingError> {
        let tokenizer = if let Some(path) = &files.tokenizer {
            log::info!("Loading tokenizer from {}", path.display());

            Tokenizer::from_file(path).map_err(|e| EncodingError::Tokenizer(e.to_string()))?
        } else if let Some(path) = &files.vocab {
            return Self::from_vocab_file(path, do_lower_case);
        } else {
            log::info!("Loading tokenizer for {} from the Hugging Face Hub", model_name);

            Tokenizer::from_pretrained(model_name, None)
                .map_err(|e| EncodingError::Tokenizer(e.to_string()))?
        };

        Self::new(tokenizer, do_lower_case)
    }

    /// Build a BERT WordPiece tokenizer from a `vocab.txt` file
    pub fn from_vocab_file(path: &Path, do_lower_case: bool) -> Result<Self, EncodingError> {
        log::info!("Loading vocabulary from {}", path.display());

        let path = path
            .to_str()
            .ok_or_else(|| EncodingError::Tokenizer(format!("invalid path {}", path.display())))?;

        let wordpiece = WordPiece::from_file(path)
            .unk_token(UNK_TOKEN.to_string())
            .build()
            .map_err(|e| EncodingError::Tokenizer(e.to_string()))?;

        let mut tokenizer = Tokenizer::new(wordpiece);
        tokenizer.with_normalizer(BertNormalizer::new(true, true, None, do_lower_case));
        tokenizer.with_pre_tokenizer(BertPreTokenizer);

        Self::new(tokenizer, do_lower_case)
    }

    /// The vocabulary size, including added tokens
    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    /// The ids of `[CLS]`, `[SEP]`, `[PAD]`, `[UNK]` and `[MASK]`
    pub fn special_ids(&self) -> [i64; 5] {
        [self.cls_id, self.sep_id, self.pad_id, self.unk_id, self.mask_id]
    }

    /// One id per character, so that positions line up with character offsets
    pub fn char_ids(&self, text: &str) -> Vec<i64> {
        text.chars()
            .map(|c| {
                let c = if self.do_lower_case {
                    c.to_lowercase().next().unwrap_or(c)
                } else {
                    c
                };

                self.tokenizer
                    .token_to_id(c.encode_utf8(&mut [0; 4]))
                    .map(i64::from)
                    .unwrap_or(self.unk_id)
            })
            .collect()
    }

    /// Encode one token per character, truncated to fit `[CLS]` and `[SEP]` and padded
    pub fn encode_chars(&self, text: &str, max_seq_length: usize) -> Result<Encoded, EncodingError> {
        check_length(max_seq_length)?;

        Ok(self.wrap(self.char_ids(text), max_seq_length))
    }

    /// Word pieces with their ids, without special tokens. A post-processor of the tokenizer is
    /// never applied.
    pub fn tokenize(&self, text: &str) -> Result<Vec<(i64, String)>, EncodingError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| EncodingError::Tokenizer(e.to_string()))?;

        Ok(encoding
            .get_ids()
            .iter()
            .zip(encoding.get_tokens())
            .map(|(id, token)| (i64::from(*id), token.clone()))
            .collect())
    }

    /// Encode through the sub-word tokenizer, truncated to keep a final `[SEP]` and padded
    pub fn encode_text(&self, text: &str, max_seq_length: usize) -> Result<Encoded, EncodingError> {
        check_length(max_seq_length)?;

        let ids = self.tokenize(text)?.into_iter().map(|(id, _)| id).collect();

        Ok(self.wrap(ids, max_seq_length))
    }

    /// Wrap already-looked-up ids in `[CLS]`/`[SEP]` and pad them to `max_seq_length`
    pub fn wrap(&self, mut ids: Vec<i64>, max_seq_length: usize) -> Encoded {
        ids.truncate(max_seq_length.saturating_sub(2));

        let mut input_ids = Vec::with_capacity(max_seq_length);
        input_ids.push(self.cls_id);
        input_ids.extend(ids);
        input_ids.push(self.sep_id);

        let seqlen = input_ids.len();
        let mut attention_mask = vec![1; seqlen];

        input_ids.resize(max_seq_length, self.pad_id);
        attention_mask.resize(max_seq_length, 0);

        Encoded {
            input_ids,
            attention_mask,
            token_type_ids: vec![0; max_seq_length],
            seqlen,
        }
    }
}

fn check_length(max_seq_length: usize) -> Result<(), EncodingError> {
    if max_seq_length < 3 {
        return Err(EncodingError::SequenceTooShort(max_seq_length));
    }

    Ok(())
}

/// Encoding errors
#[derive(thiserror::Error, Debug)]
pub enum EncodingError {
    /// The vocabulary lacks a required special token
    #[error("the vocabulary has no {0} token")]
    MissingToken(&'static str),

    /// The tokenizer failed to load or to encode
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// No room for any token between `[CLS]` and `[SEP]`
    #[error("max sequence length must be at least 3, got {0}")]
    SequenceTooShort(usize),
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    /// A small vocabulary: the special tokens take ids 0 to 4
    pub(crate) const VOCAB: &[&str] = &[
        "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "北", "京", "大", "学", "是", "a", "b", "##b",
        "ab",
    ];

    pub(crate) fn encoder(do_lower_case: bool) -> (TempDir, Encoder) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, VOCAB.join("\n")).unwrap();

        let encoder = Encoder::from_vocab_file(&path, do_lower_case).unwrap();

        (dir, encoder)
    }

    #[test]
    fn test_special_ids() {
        let (_dir, encoder) = encoder(true);

        assert_eq!(encoder.special_ids(), [2, 3, 0, 1, 4]);
        assert_eq!(encoder.vocab_size(), VOCAB.len());
    }

    #[test]
    fn test_encode_chars_pads_and_keeps_offsets() {
        let (_dir, encoder) = encoder(true);
        let encoded = encoder.encode_chars("北京A大学", 10).unwrap();

        assert_eq!(encoded.input_ids, vec![2, 5, 6, 10, 7, 8, 3, 0, 0, 0]);
        assert_eq!(encoded.attention_mask, vec![1, 1, 1, 1, 1, 1, 1, 0, 0, 0]);
        assert_eq!(encoded.token_type_ids, vec![0; 10]);
        assert_eq!(encoded.seqlen, 7);
    }

    #[test]
    fn test_encode_chars_unknown_and_case() {
        let (_dir, encoder) = encoder(false);
        let encoded = encoder.encode_chars("A是?", 6).unwrap();

        assert_eq!(encoded.input_ids, vec![2, 1, 9, 1, 3, 0]);
    }

    #[test]
    fn test_encode_chars_truncates() {
        let (_dir, encoder) = encoder(true);
        let encoded = encoder.encode_chars("北京大学", 4).unwrap();

        assert_eq!(encoded.input_ids, vec![2, 5, 6, 3]);
        assert_eq!(encoded.seqlen, 4);
        assert_eq!(encoded.len(), 4);
    }

    #[test]
    fn test_encode_text_uses_word_pieces() {
        let (_dir, encoder) = encoder(true);
        let encoded = encoder.encode_text("abb 北京", 8).unwrap();

        assert_eq!(encoded.input_ids, vec![2, 13, 12, 5, 6, 3, 0, 0]);
        assert_eq!(encoded.seqlen, 6);

        let truncated = encoder.encode_text("abb 北京", 4).unwrap();
        assert_eq!(truncated.input_ids, vec![2, 13, 12, 3]);
    }

    #[test]
    fn test_tokenizer_file_settings_are_ignored() {
        use tokenizers::{
            processors::template::TemplateProcessing, PaddingParams, PaddingStrategy,
            TruncationParams,
        };

        let (_dir, plain) = encoder(true);
        let mut tokenizer = plain.tokenizer.clone();

        let template = TemplateProcessing::builder()
            .try_single("[CLS] $A [SEP]")
            .unwrap()
            .special_tokens(vec![("[CLS]", 2), ("[SEP]", 3)])
            .build()
            .unwrap();
        tokenizer.with_post_processor(template);
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(12),
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: 2,
                ..Default::default()
            }))
            .unwrap();

        let configured = Encoder::new(tokenizer, true).unwrap();

        assert_eq!(
            configured.tokenize("abb 北京").unwrap(),
            plain.tokenize("abb 北京").unwrap()
        );
        assert_eq!(
            configured.encode_text("abb 北京", 8).unwrap().input_ids,
            vec![2, 13, 12, 5, 6, 3, 0, 0]
        );
    }

    #[test]
    fn test_too_short() {
        let (_dir, encoder) = encoder(true);

        assert!(matches!(
            encoder.encode_chars("北京", 2),
            Err(EncodingError::SequenceTooShort(2))
        ));
    }

    #[test]
    fn test_missing_special_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "[PAD]\n[UNK]\n[CLS]\n[SEP]\n北").unwrap();

        assert!(matches!(
            Encoder::from_vocab_file(&path, true),
            Err(EncodingError::MissingToken("[MASK]"))
        ));
    }
}
