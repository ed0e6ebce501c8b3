use bert_burn::model::BertModel;
use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};
use derive_new::new;

use crate::{
    models::bert::{hidden_states, Config, Head},
    pipelines::{batcher::Infer, output::Output, relation_extraction::batcher::Targets},
    utils::losses::weighted_binary_cross_entropy,
};

/// BERT with one multi-label row per token, `2 * n_predicates + 2` columns wide: outside,
/// continuation, then a subject start and an object start column per predicate
#[derive(Module, Debug, new)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// Token link classifier
    pub output: Linear<B>,
}

impl<B: Backend> Head<B> for Model<B> {
    fn init_with(config: &Config, encoder: BertModel<B>, device: &B::Device) -> Self {
        let output = LinearConfig::new(config.hidden_size, config.n_labels() * 2 + 2).init(device);

        Self::new(encoder, output)
    }
}

impl<B: Backend> Model<B> {
    /// Link logits, `[batch_size, seq_length, 2 * n_predicates + 2]`
    pub fn logits(&self, input: Infer<B>) -> Tensor<B, 3> {
        self.output.forward(hidden_states(&self.model, input))
    }

    /// Defines forward pass for training
    pub fn forward(&self, input: Infer<B>, targets: Targets<B>) -> Output<B>
    where
        i64: std::convert::From<<B as burn::tensor::backend::Backend>::IntElem>,
    {
        let logits = self.logits(input);
        let loss = weighted_binary_cross_entropy(logits, targets.links, targets.mask);

        Output::new(loss)
    }

    /// Link probabilities
    pub fn infer(&self, input: Infer<B>) -> Tensor<B, 3> {
        sigmoid(self.logits(input))
    }
}
