use bert_burn::model::BertModel;
use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};
use derive_new::new;

use crate::{
    models::bert::{hidden_states, Config, Head},
    pipelines::{batcher::Infer, output::Output},
    utils::{losses::multilabel_categorical_crossentropy, tensors::float_tensor},
};

/// Added to the logits of cells that can never hold a span
const MASKED: f64 = 1e12;

/// BERT with an efficient global pointer: every `(start, end)` cell of the sequence gets one
/// logit per label, built from a shared query/key projection plus per-label start and end
/// biases.
#[derive(Module, Debug, new)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// Query and key projection, `hidden -> 2 * head_size`
    pub dense_1: Linear<B>,

    /// Per-label start and end biases, `2 * head_size -> 2 * n_labels`
    pub dense_2: Linear<B>,

    /// Query/key size
    pub head_size: usize,

    /// Number of entity labels
    pub n_labels: usize,
}

impl<B: Backend> Head<B> for Model<B> {
    fn init_with(config: &Config, encoder: BertModel<B>, device: &B::Device) -> Self {
        let dense_1 = LinearConfig::new(config.hidden_size, config.head_size * 2).init(device);
        let dense_2 = LinearConfig::new(config.head_size * 2, config.n_labels() * 2).init(device);

        Self::new(
            encoder,
            dense_1,
            dense_2,
            config.head_size,
            config.n_labels(),
        )
    }
}

impl<B: Backend> Model<B> {
    /// Span logits, `[batch_size, n_labels, seq_length, seq_length]`. Padding cells and cells
    /// with `end < start` are pushed to `-1e12`.
    pub fn logits(&self, input: Infer<B>) -> Tensor<B, 4> {
        let [batch_size, seq_length] = input.dims();
        let (n, d) = (self.n_labels, self.head_size);
        let device = input.tokens.device();
        let attention = input.attention();

        let sequence = self.dense_1.forward(hidden_states(&self.model, input));

        let query = sequence.clone().slice([0..batch_size, 0..seq_length, 0..d]);
        let key = sequence.clone().slice([0..batch_size, 0..seq_length, d..2 * d]);

        let scores = query
            .matmul(key.swap_dims(1, 2))
            .div_scalar((d as f64).sqrt())
            .unsqueeze_dim::<4>(1)
            .repeat(1, n);

        let bias = self.dense_2.forward(sequence).swap_dims(1, 2).div_scalar(2.0);
        let start_bias = bias
            .clone()
            .slice([0..batch_size, 0..n, 0..seq_length])
            .unsqueeze_dim::<4>(3)
            .repeat(3, seq_length);
        let end_bias = bias
            .slice([0..batch_size, n..2 * n, 0..seq_length])
            .unsqueeze_dim::<4>(2)
            .repeat(2, seq_length);

        let rows = attention.clone().unsqueeze_dim::<3>(2).repeat(2, seq_length);
        let cols = attention.unsqueeze_dim::<3>(1).repeat(1, seq_length);
        let padding = (rows * cols).neg().add_scalar(1.0).unsqueeze_dim::<4>(1).repeat(1, n);

        let lower = lower_triangle::<B>(seq_length, &device)
            .repeat(0, batch_size)
            .repeat(1, n);

        scores + start_bias + end_bias - (padding + lower).mul_scalar(MASKED)
    }

    /// Defines forward pass for training. `targets` has the shape of the logits.
    pub fn forward(&self, input: Infer<B>, targets: Tensor<B, 4>) -> Output<B>
    where
        i64: std::convert::From<<B as burn::tensor::backend::Backend>::IntElem>,
    {
        let logits = self.logits(input);
        let [batch_size, n_labels, seq_length, _] = logits.dims();
        let shape = [batch_size * n_labels, seq_length * seq_length];

        let loss = multilabel_categorical_crossentropy(logits.reshape(shape), targets.reshape(shape));

        Output::new(loss)
    }
}

/// `[1, 1, len, len]` with ones strictly below the diagonal
fn lower_triangle<B: Backend>(len: usize, device: &B::Device) -> Tensor<B, 4> {
    let values = (0..len * len)
        .map(|i| if i / len > i % len { 1.0 } else { 0.0 })
        .collect();

    float_tensor([1, 1, len, len], values, device)
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::tensors::to_f32_vec;

    #[test]
    fn test_lower_triangle() {
        let device = Default::default();
        let mask = lower_triangle::<NdArray>(3, &device);

        assert_eq!(
            to_f32_vec(mask),
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0]
        );
    }
}
