use burn::{
    data::dataloader,
    tensor::{backend::Backend, Tensor},
};
use derive_new::new;

use crate::pipelines::{
    batcher::{batch_width, scatter_cells, Infer},
    encoding::Encoded,
};

use super::Feature;

/// A training batch for the global pointer
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Bert Model input
    pub input: Infer<B>,

    /// Span matrix, `[batch_size, n_labels, seq_length, seq_length]`
    pub targets: Tensor<B, 4>,
}

/// Struct for batching global pointer features
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,

    /// Number of entity labels
    pub n_labels: usize,
}

impl<B: Backend> dataloader::batcher::Batcher<Feature, Train<B>> for Batcher<B> {
    fn batch(&self, items: Vec<Feature>) -> Train<B> {
        let encoded: Vec<&Encoded> = items.iter().map(|item| &item.encoded).collect();
        let input = Infer::collate(&encoded, &self.device);
        let width = batch_width(items.iter().map(|item| item.encoded.seqlen));

        // Flatten (start, end) so that each label row holds a `width * width` matrix
        let cells: Vec<Vec<(usize, usize)>> = items
            .iter()
            .map(|item| {
                item.cells
                    .iter()
                    .filter(|(_, start, end)| *start < width && *end < width)
                    .map(|&(label, start, end)| (label, start * width + end))
                    .collect()
            })
            .collect();
        let cells: Vec<&[(usize, usize)]> = cells.iter().map(Vec::as_slice).collect();

        let targets = scatter_cells(&cells, self.n_labels, width * width, &self.device)
            .reshape([items.len(), self.n_labels, width, width]);

        Train { input, targets }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{metrics::pointer::Span, utils::tensors::to_f32_vec};

    #[test]
    fn test_targets_layout() {
        let encoded = Encoded {
            input_ids: vec![2, 5, 6, 3],
            attention_mask: vec![1; 4],
            token_type_ids: vec![0; 4],
            seqlen: 4,
        };
        let feature = Feature {
            encoded,
            cells: vec![(1, 1, 2)],
            spans: vec![Span::new(1, 0, 1)],
        };

        let batch: Train<NdArray> = Batcher::new(Default::default(), 2).batch(vec![feature]);
        assert_eq!(batch.targets.dims(), [1, 2, 4, 4]);

        let values = to_f32_vec(batch.targets);
        let hot: Vec<usize> = (0..values.len()).filter(|&i| values[i] == 1.0).collect();

        // label 1, row 1, col 2
        assert_eq!(hot, vec![16 + 4 + 2]);
    }
}
