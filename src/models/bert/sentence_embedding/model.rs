use bert_burn::model::BertModel;
use burn::{
    module::Module,
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};
use derive_new::new;

use crate::{
    models::bert::{pooled, Config, Head},
    pipelines::{batcher::Infer, output::Output},
    utils::tensors::{float_tensor, int_tensor},
};

const EPSILON: f64 = 1e-12;

/// BERT sentence embeddings: the pooled output through a bias-free projection
#[derive(Module, Debug, new)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// Projection to the embedding size
    pub projection: Linear<B>,

    /// Softmax temperature of the contrastive loss
    pub temperature: f64,
}

impl<B: Backend> Head<B> for Model<B> {
    fn init_with(config: &Config, encoder: BertModel<B>, device: &B::Device) -> Self {
        let projection = LinearConfig::new(config.hidden_size, config.projection_size)
            .with_bias(false)
            .init(device);

        Self::new(encoder, projection, config.temperature)
    }
}

impl<B: Backend> Model<B> {
    /// Sentence embeddings, `[batch_size, projection_size]`
    pub fn embed(&self, input: Infer<B>) -> Tensor<B, 2> {
        self.projection.forward(pooled(&self.model, input))
    }

    /// Defines forward pass for training. Rows `2k` and `2k + 1` hold the same sentence, their
    /// different dropout masks make them each other's positive.
    pub fn forward(&self, input: Infer<B>) -> Output<B>
    where
        i64: std::convert::From<<B as burn::tensor::backend::Backend>::IntElem>,
    {
        Output::new(self.contrastive_loss(self.embed(input)))
    }

    /// In-batch contrastive loss over L2-normalised embeddings
    pub fn contrastive_loss(&self, embeddings: Tensor<B, 2>) -> Tensor<B, 1> {
        let [rows, _] = embeddings.dims();
        let device = embeddings.device();

        let normalized = normalize(embeddings);
        let similarities = normalized.clone().matmul(normalized.transpose());

        let similarities = (similarities - identity::<B>(rows, &device).mul_scalar(1e12))
            .div_scalar(self.temperature);

        let targets = int_tensor([rows], positives(rows), &device);

        CrossEntropyLossConfig::new()
            .init(&device)
            .forward(similarities, targets)
    }
}

/// Scale every row to unit length
pub fn normalize<B: Backend>(embeddings: Tensor<B, 2>) -> Tensor<B, 2> {
    let [_, size] = embeddings.dims();

    let norms = embeddings
        .clone()
        .powf_scalar(2.0)
        .sum_dim(1)
        .sqrt()
        .add_scalar(EPSILON)
        .repeat(1, size);

    embeddings / norms
}

/// The positive of row `i` is row `i ^ 1`
fn positives(rows: usize) -> Vec<i64> {
    (0..rows).map(|i| (i ^ 1) as i64).collect()
}

fn identity<B: Backend>(size: usize, device: &B::Device) -> Tensor<B, 2> {
    let values = (0..size * size)
        .map(|i| if i / size == i % size { 1.0 } else { 0.0 })
        .collect();

    float_tensor([size, size], values, device)
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{models::bert::config::tests::tiny_config, utils::tensors::to_f32_vec};

    type B = NdArray;

    fn loss_of(temperature: f64, embeddings: Vec<f32>) -> f32 {
        let device = Default::default();
        let model: Model<B> = tiny_config(8, 0)
            .with_temperature(temperature)
            .init(&device);
        let embeddings = float_tensor::<B, 2>([4, 2], embeddings, &device);

        to_f32_vec(model.contrastive_loss(embeddings))[0]
    }

    #[test]
    fn test_positives_pair_neighbours() {
        assert_eq!(positives(4), vec![1, 0, 3, 2]);
    }

    #[test]
    fn test_normalize() {
        let device = Default::default();
        let embeddings = float_tensor::<B, 2>([2, 2], vec![3.0, 4.0, 0.0, 2.0], &device);

        let values = to_f32_vec(normalize(embeddings));
        let expected = [0.6, 0.8, 0.0, 1.0];

        for (value, expected) in values.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_contrastive_loss_values() {
        // Rows 0/1 and 2/3 agree: each row scores e^2 for its positive and e^0 for the other
        // pair, the diagonal drops out, so every row costs ln(1 + 2e^-2)
        let aligned = loss_of(0.5, vec![1.0, 0.0, 3.0, 0.0, 0.0, 2.0, 0.0, 1.0]);
        assert!((aligned - 0.239_544_77).abs() < 1e-5, "{}", aligned);

        // Rows 0/2 and 1/3 agree instead, so the positive at i ^ 1 scores e^0 against e^2
        let crossed = loss_of(0.5, vec![1.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 5.0]);
        assert!((crossed - 2.239_544_8).abs() < 1e-5, "{}", crossed);

        // A lower temperature sharpens the softmax
        let sharp = loss_of(0.25, vec![1.0, 0.0, 3.0, 0.0, 0.0, 2.0, 0.0, 1.0]);
        let expected = (1.0 + 2.0 * (-4.0f64).exp()).ln() as f32;
        assert!((sharp - expected).abs() < 1e-5, "{}", sharp);
    }
}
