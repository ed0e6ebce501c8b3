use bert_burn::model::BertModel;
use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};
use derive_new::new;

use crate::{
    models::bert::{hidden_states, Config, Head},
    pipelines::{batcher::Infer, cascade_tagging::batcher::Targets, output::Output},
    utils::losses::weighted_cross_entropy,
};

/// Number of sequence tags: `O`, `B` and `I`
pub const N_TAGS: usize = 3;

/// BERT with two token classifiers: one for BIO sequence tags and one for the entity type
#[derive(Module, Debug, new)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// BIO tag classifier
    pub seq_fc: Linear<B>,

    /// Entity type classifier
    pub ent_fc: Linear<B>,
}

impl<B: Backend> Head<B> for Model<B> {
    fn init_with(config: &Config, encoder: BertModel<B>, device: &B::Device) -> Self {
        let seq_fc = LinearConfig::new(config.hidden_size, N_TAGS).init(device);
        let ent_fc = LinearConfig::new(config.hidden_size, config.n_labels()).init(device);

        Self::new(encoder, seq_fc, ent_fc)
    }
}

impl<B: Backend> Model<B> {
    /// Sequence tag and entity type logits, `[batch_size, seq_length, 3]` and
    /// `[batch_size, seq_length, n_labels]`
    pub fn logits(&self, input: Infer<B>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let hidden = hidden_states(&self.model, input);

        (self.seq_fc.forward(hidden.clone()), self.ent_fc.forward(hidden))
    }

    /// Defines forward pass for training. The entity type loss only counts tagged tokens.
    pub fn forward(&self, input: Infer<B>, targets: Targets<B>) -> Output<B>
    where
        i64: std::convert::From<<B as burn::tensor::backend::Backend>::IntElem>,
    {
        let weights = input.attention();
        let (seq_logits, ent_logits) = self.logits(input);

        let tagged = targets.seqs.clone().greater_elem(0).float();

        let loss = weighted_cross_entropy(seq_logits, targets.seqs, weights)
            + weighted_cross_entropy(ent_logits, targets.ents, tagged);

        Output::new(loss)
    }
}
