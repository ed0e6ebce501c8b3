use burn::tensor::{
    activation::{log_softmax, sigmoid},
    backend::Backend,
    Int, Tensor,
};

const EPSILON: f64 = 1e-12;

/// Token-level cross entropy, weighted per position. `logits` is `[batch, seq, classes]`,
/// `targets` and `weights` are `[batch, seq]`. Returns `sum(ce * w) / (sum(w) + eps)`.
pub fn weighted_cross_entropy<B: Backend>(
    logits: Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    weights: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [batch_size, seq_length, _] = logits.dims();

    let picked = log_softmax(logits, 2)
        .gather(2, targets.unsqueeze_dim::<3>(2))
        .reshape([batch_size, seq_length]);

    let total = weights.clone().sum().add_scalar(EPSILON);

    (picked * weights).sum().neg() / total
}

/// Binary cross entropy on logits, averaged over the class axis and weighted per position.
/// `logits` and `targets` are `[batch, seq, classes]`, `weights` is `[batch, seq]`.
pub fn weighted_binary_cross_entropy<B: Backend>(
    logits: Tensor<B, 3>,
    targets: Tensor<B, 3>,
    weights: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [batch_size, seq_length, _] = logits.dims();

    let probs = sigmoid(logits).clamp(1e-7, 1.0 - 1e-7);
    let positive = targets.clone() * probs.clone().log();
    let negative = targets.neg().add_scalar(1.0) * probs.neg().add_scalar(1.0).log();

    let per_position = (positive + negative)
        .neg()
        .mean_dim(2)
        .reshape([batch_size, seq_length]);

    let total = weights.clone().sum().add_scalar(EPSILON);

    (per_position * weights).sum() / total
}

/// Multi-label categorical cross entropy, used by the global pointer head. `logits` and
/// `targets` are `[rows, cells]`, a cell is positive when its target is 1.
pub fn multilabel_categorical_crossentropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [rows, _] = logits.dims();
    let device = logits.device();

    let signs = targets.clone().mul_scalar(-2.0).add_scalar(1.0);
    let logits = logits * signs;

    let negatives = logits.clone() - targets.clone().mul_scalar(1e12);
    let positives = logits - targets.neg().add_scalar(1.0).mul_scalar(1e12);

    let zeros = Tensor::<B, 2>::zeros([rows, 1], &device);
    let negatives = Tensor::cat(vec![negatives, zeros.clone()], 1);
    let positives = Tensor::cat(vec![positives, zeros], 1);

    (log_sum_exp(negatives) + log_sum_exp(positives)).mean()
}

/// Numerically stable `log(sum(exp(x)))` over the last axis of a 2D tensor, keeping the axis
pub fn log_sum_exp<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let max = x.clone().max_dim(1).detach();

    (x - max.clone()).exp().sum_dim(1).log() + max
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;
    use crate::utils::tensors::{float_tensor, int_tensor, to_f32_vec};

    type B = NdArray;

    fn close(actual: Tensor<B, 1>, expected: f32) {
        let actual = to_f32_vec(actual)[0];
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_weighted_cross_entropy_ignores_zero_weights() {
        let device = Default::default();
        let logits = Tensor::<B, 3>::zeros([1, 2, 4], &device);
        let targets = int_tensor::<B, 2>([1, 2], vec![1, 3], &device);
        let weights = float_tensor::<B, 2>([1, 2], vec![1.0, 0.0], &device);

        close(weighted_cross_entropy(logits, targets, weights), 4f32.ln());
    }

    #[test]
    fn test_weighted_binary_cross_entropy() {
        let device = Default::default();
        let logits = Tensor::<B, 3>::zeros([1, 2, 3], &device);
        let targets = float_tensor::<B, 3>([1, 2, 3], vec![1.0, 0.0, 1.0, 0.0, 0.0, 0.0], &device);
        let weights = float_tensor::<B, 2>([1, 2], vec![1.0, 1.0], &device);

        close(
            weighted_binary_cross_entropy(logits, targets, weights),
            2f32.ln(),
        );
    }

    #[test]
    fn test_multilabel_categorical_crossentropy() {
        let device = Default::default();
        let logits = Tensor::<B, 2>::zeros([1, 2], &device);
        let targets = float_tensor::<B, 2>([1, 2], vec![1.0, 0.0], &device);

        close(
            multilabel_categorical_crossentropy(logits, targets),
            2.0 * 2f32.ln(),
        );
    }
}
