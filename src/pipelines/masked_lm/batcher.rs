use burn::{
    data::dataloader,
    tensor::{backend::Backend, Int, Tensor},
};
use derive_new::new;

use crate::{
    pipelines::{batcher::Infer, encoding::Encoded},
    utils::tensors::{float_tensor, stack_trimmed},
};

use super::Feature;

/// What the masked positions should predict
#[derive(Clone, Debug, new)]
pub struct Targets<B: Backend> {
    /// Original token ids at masked positions, the padding id elsewhere
    pub labels: Tensor<B, 2, Int>,

    /// 1 at masked positions
    pub weights: Tensor<B, 2>,
}

/// A training batch for masked language modeling
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Bert Model input, with masked tokens
    pub input: Infer<B>,

    /// Prediction targets
    pub targets: Targets<B>,
}

/// Batches masked features
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

impl<B: Backend> dataloader::batcher::Batcher<Feature, Train<B>> for Batcher<B> {
    fn batch(&self, items: Vec<Feature>) -> Train<B> {
        let encoded: Vec<&Encoded> = items.iter().map(|item| &item.encoded).collect();
        let input = Infer::collate(&encoded, &self.device);
        let [batch_size, width] = input.dims();

        let labels: Vec<&[i64]> = items.iter().map(|item| item.labels.as_slice()).collect();
        let labels = stack_trimmed::<B>(&labels, width, &self.device);

        let weights = items
            .iter()
            .flat_map(|item| item.weights[..width].iter().copied())
            .collect();
        let weights = float_tensor([batch_size, width], weights, &self.device);

        Train {
            input,
            targets: Targets { labels, weights },
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        pipelines::encoding::tests::encoder,
        utils::tensors::{to_f32_vec, to_i64_vec},
    };

    #[test]
    fn test_batch_trims_targets() {
        let (_dir, encoder) = encoder(true);
        let device = Default::default();

        let feature = |text: &str, position: usize| {
            let mut encoded = encoder.encode_chars(text, 8).unwrap();
            let mut labels = vec![encoder.pad_id; 8];
            let mut weights = vec![0.0; 8];

            labels[position] = encoded.input_ids[position];
            weights[position] = 1.0;
            encoded.input_ids[position] = encoder.mask_id;

            Feature {
                encoded,
                labels,
                weights,
            }
        };

        let batch = Batcher::<NdArray>::new(device).batch(vec![feature("北京", 1), feature("大", 1)]);

        assert_eq!(batch.input.dims(), [2, 4]);
        assert_eq!(to_i64_vec(batch.input.tokens), vec![2, 4, 6, 3, 2, 4, 3, 0]);
        assert_eq!(to_i64_vec(batch.targets.labels), vec![0, 5, 0, 0, 0, 7, 0, 0]);
        assert_eq!(
            to_f32_vec(batch.targets.weights),
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]
        );
    }
}
