/// Shared head configuration
pub mod config;

/// Pre-trained checkpoint access
pub mod weights;

/// BERT for Text Classification (such as news topic classification)
pub mod text_classification;

/// BERT with start/end span tagging for named entity recognition
pub mod span_ner;

/// BERT with a global pointer span matrix for named entity recognition
pub mod global_pointer;

/// BERT with cascaded BIO tagging and entity typing
pub mod cascade_tagging;

/// BERT with token linking for relation extraction
pub mod relation_extraction;

/// BERT sentence embeddings trained with SimCSE
pub mod sentence_embedding;

/// BERT with a masked language model head
pub mod masked_lm;

pub use config::{Config, Head};
pub use weights::Weights;

use bert_burn::model::{BertModel, BertModelOutput};
use burn::tensor::{backend::Backend, Tensor};

use crate::pipelines::batcher::Infer;

/// Run the encoder and keep the `[batch, seq, hidden]` hidden states
pub fn hidden_states<B: Backend>(model: &BertModel<B>, input: Infer<B>) -> Tensor<B, 3> {
    let BertModelOutput { hidden_states, .. } = model.forward(input.into());

    hidden_states
}

/// Run the encoder and keep the `[batch, hidden]` sentence vector: the pooler output when the
/// model has a pooling layer, the `[CLS]` hidden state otherwise
pub fn pooled<B: Backend>(model: &BertModel<B>, input: Infer<B>) -> Tensor<B, 2> {
    let [batch_size, _seq_length] = input.dims();

    let BertModelOutput {
        pooled_output,
        hidden_states,
    } = model.forward(input.into());

    let output = pooled_output.unwrap_or(hidden_states);
    let [_, _, hidden_size] = output.dims();

    output
        .slice([0..batch_size, 0..1])
        .reshape([batch_size, hidden_size])
}
