use burn::{
    data::dataloader,
    tensor::{backend::Backend, Int, Tensor},
};
use derive_new::new;

use crate::{
    pipelines::{batcher::Infer, encoding::Encoded},
    utils::tensors::int_tensor,
};

use super::Feature;

/// A training batch for text classification
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Bert Model input
    pub input: Infer<B>,

    /// Class ids for the batch
    pub targets: Tensor<B, 1, Int>,
}

/// Struct for batching text classification features
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

/// Implement Batcher trait for Batcher struct for training
impl<B: Backend> dataloader::batcher::Batcher<Feature, Train<B>> for Batcher<B> {
    /// Collects a vector of text classification features into a training batch
    fn batch(&self, items: Vec<Feature>) -> Train<B> {
        let encoded: Vec<&Encoded> = items.iter().map(|item| &item.encoded).collect();
        let input = Infer::collate(&encoded, &self.device);

        let labels = items.iter().map(|item| item.label as i64).collect();
        let targets = int_tensor([items.len()], labels, &self.device);

        Train { input, targets }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        datasets::tnews,
        pipelines::{encoding::tests::encoder, text_classification::item::encode},
        utils::{classes::Labels, tensors::to_i64_vec},
    };

    #[test]
    fn test_batch_trims_and_keeps_labels() {
        let (_dir, encoder) = encoder(true);
        let labels = Labels::sorted(["a", "b"]);

        let features = [("北京大学", "b"), ("是", "a")]
            .into_iter()
            .map(|(text, label)| {
                let item = tnews::Item::new(text.to_string(), Some(label.to_string()));
                encode(&encoder, &labels, &item, 16).unwrap()
            })
            .collect();

        let batch: Train<NdArray> = Batcher::new(Default::default()).batch(features);

        assert_eq!(batch.input.dims(), [2, 6]);
        assert_eq!(to_i64_vec(batch.targets), vec![1, 0]);
    }
}
