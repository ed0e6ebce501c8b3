use bert_burn::model::BertModel;
use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{
        activation::{sigmoid, softmax},
        backend::Backend,
        Tensor,
    },
};
use derive_new::new;

use crate::{
    models::bert::{hidden_states, Config, Head},
    pipelines::{batcher::Infer, output::Output, span_ner::batcher::Targets},
    utils::losses::{weighted_binary_cross_entropy, weighted_cross_entropy},
};

/// BERT with a start classifier and an end classifier over every token.
///
/// In single-label mode each classifier predicts `n_labels + 1` classes per token, with class 0
/// meaning "no boundary here". In multi-label mode each predicts `n_labels` independent sigmoid
/// outputs.
#[derive(Module, Debug, new)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// Span start classifier
    pub start_fc: Linear<B>,

    /// Span end classifier
    pub end_fc: Linear<B>,

    /// Independent sigmoid outputs per label
    pub multilabel: bool,
}

impl<B: Backend> Head<B> for Model<B> {
    fn init_with(config: &Config, encoder: BertModel<B>, device: &B::Device) -> Self {
        let n_outputs = if config.with_multilabel {
            config.n_labels()
        } else {
            config.n_labels() + 1
        };

        let start_fc = LinearConfig::new(config.hidden_size, n_outputs).init(device);
        let end_fc = LinearConfig::new(config.hidden_size, n_outputs).init(device);

        Self::new(encoder, start_fc, end_fc, config.with_multilabel)
    }
}

impl<B: Backend> Model<B> {
    /// Start and end logits, each `[batch_size, seq_length, n_outputs]`
    pub fn logits(&self, input: Infer<B>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let hidden = hidden_states(&self.model, input);

        (
            self.start_fc.forward(hidden.clone()),
            self.end_fc.forward(hidden),
        )
    }

    /// Defines forward pass for training
    pub fn forward(&self, input: Infer<B>, targets: Targets<B>) -> Output<B>
    where
        i64: std::convert::From<<B as burn::tensor::backend::Backend>::IntElem>,
    {
        let weights = input.attention();
        let (start, end) = self.logits(input);

        let loss = match targets {
            Targets::Single { start: s, end: e } => {
                weighted_cross_entropy(start, s, weights.clone())
                    + weighted_cross_entropy(end, e, weights)
            }
            Targets::Multi { start: s, end: e } => {
                weighted_binary_cross_entropy(start, s, weights.clone())
                    + weighted_binary_cross_entropy(end, e, weights)
            }
        };

        Output::new(loss.div_scalar(2.0))
    }

    /// Start and end probabilities: a softmax over classes in single-label mode, per-label
    /// sigmoids in multi-label mode
    pub fn infer(&self, input: Infer<B>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let (start, end) = self.logits(input);

        if self.multilabel {
            (sigmoid(start), sigmoid(end))
        } else {
            (softmax(start, 2), softmax(end, 2))
        }
    }
}
