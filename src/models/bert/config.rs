//! Adapt a pre-trained BERT checkpoint to the task heads

use std::{collections::BTreeMap, path::PathBuf};

use bert_burn::model::{BertModel, BertModelConfig};
use burn::{config::Config as _, module::Module, tensor::backend::Backend};

use crate::utils::classes::Labels;

use super::weights::Weights;

/// A task head that wraps the BERT encoder
pub trait Head<B: Backend>: Module<B> + Sized {
    /// Build the head around an encoder, with freshly initialized task layers
    fn init_with(config: &Config, encoder: BertModel<B>, device: &B::Device) -> Self;

    /// Replace task layers with pre-trained ones found in the checkpoint
    fn load_head(self, _weights: &Weights, _device: &B::Device) -> anyhow::Result<Self> {
        Ok(self)
    }
}

/// The Model Configuration
#[derive(burn::config::Config)]
pub struct Config {
    // -- Fields copied from BertModelConfig because #[serde(flatten)] is not supported yet
    /// Number of attention heads in the multi-head attention
    pub num_attention_heads: usize,
    /// Number of transformer encoder layers/blocks
    pub num_hidden_layers: usize,
    /// Layer normalization epsilon
    pub layer_norm_eps: f64,
    /// Size of bert embedding (e.g., 768 for bert-base-chinese)
    pub hidden_size: usize,
    /// Size of the intermediate position wise feedforward layer
    pub intermediate_size: usize,
    /// Size of the vocabulary
    pub vocab_size: usize,
    /// Max position embeddings, 512 for BERT
    pub max_position_embeddings: usize,
    /// Identifier for sentence type in input (e.g., 0 for single sentence, 1 for pair)
    pub type_vocab_size: usize,
    /// Dropout value across layers, typically 0.1
    pub hidden_dropout_prob: f64,
    /// BERT model name (bert)
    pub model_type: String,
    /// Index of the padding token
    pub pad_token_id: usize,
    /// Maximum sequence length for the tokenizer
    pub max_seq_len: Option<usize>,
    /// Whether to add a pooling layer to the model
    pub with_pooling_layer: Option<bool>,
    // -- End fields copied from BertModelConfig
    /// A map from label ids to label names, empty for tasks without labels
    pub id2label: BTreeMap<usize, String>,

    /// Span NER: independent sigmoid outputs per label
    #[config(default = false)]
    pub with_multilabel: bool,

    /// Global pointer: query/key size
    #[config(default = 64)]
    pub head_size: usize,

    /// SimCSE: embedding size
    #[config(default = 512)]
    pub projection_size: usize,

    /// SimCSE: softmax temperature
    #[config(default = 0.05)]
    pub temperature: f64,
}

impl Config {
    /// Combine a BERT config with a task label vocabulary
    pub fn new_with_labels(model: BertModelConfig, labels: &Labels) -> Self {
        Config::new(
            model.num_attention_heads,
            model.num_hidden_layers,
            model.layer_norm_eps,
            model.hidden_size,
            model.intermediate_size,
            model.vocab_size,
            model.max_position_embeddings,
            model.type_vocab_size,
            model.hidden_dropout_prob,
            model.model_type,
            model.pad_token_id,
            labels.id2label().clone(),
        )
        .with_max_seq_len(model.max_seq_len)
        .with_with_pooling_layer(model.with_pooling_layer)
    }

    /// Load a Hugging Face `config.json`
    pub fn load_pretrained(
        config_file: PathBuf,
        labels: &Labels,
        with_pooling_layer: bool,
    ) -> anyhow::Result<Self> {
        let mut bert_config = BertModelConfig::load(config_file)
            .map_err(|e| anyhow!("Unable to load Hugging Face Config file: {}", e))?;

        bert_config.with_pooling_layer = Some(with_pooling_layer);

        Ok(Config::new_with_labels(bert_config, labels))
    }

    /// Get the Bert model configuration
    pub fn get_bert_config(&self) -> BertModelConfig {
        BertModelConfig::new(
            self.num_attention_heads,
            self.num_hidden_layers,
            self.layer_norm_eps,
            self.hidden_size,
            self.intermediate_size,
            self.vocab_size,
            self.max_position_embeddings,
            self.type_vocab_size,
            self.hidden_dropout_prob,
            self.model_type.clone(),
            self.pad_token_id,
        )
        .with_max_seq_len(self.max_seq_len)
        .with_with_pooling_layer(self.with_pooling_layer)
    }

    /// The label vocabulary of the head
    pub fn labels(&self) -> Labels {
        Labels::from_id2label(&self.id2label)
    }

    /// The number of labels
    pub fn n_labels(&self) -> usize {
        self.id2label.len()
    }

    /// Initialize a model with random weights
    pub fn init<B: Backend, M: Head<B>>(&self, device: &B::Device) -> M {
        let encoder = self.get_bert_config().init(device);

        M::init_with(self, encoder, device)
    }

    /// Initialize a model with the pre-trained encoder weights. Task layers without a
    /// counterpart in the checkpoint stay random.
    pub fn init_pretrained<B: Backend, M: Head<B>>(
        &self,
        weights: PathBuf,
        device: &B::Device,
    ) -> anyhow::Result<M> {
        let checkpoint = Weights::load(&weights, &self.model_type)?;
        for layer in 0..self.num_hidden_layers {
            let key = format!("encoder.layer.{}.attention.self.query.weight", layer);
            if !checkpoint.contains(&key) {
                return Err(anyhow!("{} has no {} tensor", weights.display(), key));
            }
        }

        let bert_config = self.get_bert_config();
        let record = BertModel::from_safetensors(weights, device, bert_config.clone());
        let encoder = bert_config.init(device).load_record(record);

        M::init_with(self, encoder, device).load_head(&checkpoint, device)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use burn::backend::NdArray;

    use crate::models::bert::masked_lm::Model;

    use super::*;

    /// A one-layer encoder small enough to run on `NdArray`, labelled `L0`, `L1`, ...
    pub(crate) fn tiny_config(vocab_size: usize, n_labels: usize) -> Config {
        let id2label = (0..n_labels).map(|id| (id, format!("L{}", id))).collect();

        Config::new(
            2,
            1,
            1e-12,
            8,
            16,
            vocab_size,
            32,
            2,
            0.0,
            "bert".to_string(),
            0,
            id2label,
        )
        .with_max_seq_len(Some(32))
        .with_with_pooling_layer(Some(false))
        .with_head_size(4)
        .with_projection_size(6)
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let config = tiny_config(8, 0);
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();

        let result: anyhow::Result<Model<NdArray>> =
            config.init_pretrained(dir.path().join("model.safetensors"), &device);

        assert!(result.is_err());

        // Embeddings alone do not make a one-layer encoder
        let (_dir, path) = crate::models::bert::weights::tests::checkpoint(&[(
            "bert.embeddings.word_embeddings.weight",
            vec![8, 8],
            vec![0.0; 64],
        )]);
        let result: anyhow::Result<Model<NdArray>> = config.init_pretrained(path, &device);
        let message = result.err().map(|e| e.to_string()).unwrap_or_default();

        assert!(message.contains("encoder.layer.0.attention.self.query.weight"));
    }
}
