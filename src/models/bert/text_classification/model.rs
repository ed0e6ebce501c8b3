use bert_burn::model::BertModel;
use burn::{
    module::Module,
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig},
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};
use derive_new::new;

use crate::{
    models::bert::{pooled, Config, Head},
    pipelines::batcher::Infer,
};

/// BERT for sequence Classification
#[derive(Module, Debug, new)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// Linear layer for sequence classification
    pub output: Linear<B>,

    /// Total number of classes
    pub n_classes: usize,
}

impl<B: Backend> Head<B> for Model<B> {
    fn init_with(config: &Config, encoder: BertModel<B>, device: &B::Device) -> Self {
        let output = LinearConfig::new(config.hidden_size, config.n_labels()).init(device);

        Self::new(encoder, output, config.n_labels())
    }
}

/// Define model behavior
impl<B: Backend> Model<B> {
    /// Class logits, `[batch_size, n_classes]`
    pub fn logits(&self, input: Infer<B>) -> Tensor<B, 2> {
        self.output.forward(pooled(&self.model, input))
    }

    /// Defines forward pass for training
    pub fn forward(&self, input: Infer<B>, targets: Tensor<B, 1, Int>) -> ClassificationOutput<B>
    where
        i64: std::convert::From<<B as burn::tensor::backend::Backend>::IntElem>,
    {
        let device = &self.model.devices()[0];

        let targets = targets.to_device(device);
        let output = self.logits(input);

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput {
            loss,
            output,
            targets,
        }
    }

    /// Defines forward pass for inference
    pub fn infer(&self, input: Infer<B>) -> Tensor<B, 2> {
        softmax(self.logits(input), 1)
    }
}
