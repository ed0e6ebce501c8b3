use burn::{
    data::dataloader,
    tensor::{backend::Backend, Tensor},
};
use derive_new::new;

use crate::{
    pipelines::{
        batcher::{batch_width, scatter_cells, Infer},
        encoding::Encoded,
    },
    utils::tensors::stack_trimmed,
};

use super::{n_columns, Feature};

/// Link targets with their loss mask
#[derive(Clone, Debug, new)]
pub struct Targets<B: Backend> {
    /// Multi-hot link rows, `[batch_size, seq_length, 2 * n_predicates + 2]`
    pub links: Tensor<B, 3>,

    /// 1 for character tokens, `[batch_size, seq_length]`
    pub mask: Tensor<B, 2>,
}

/// A training batch for token linking
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Bert Model input
    pub input: Infer<B>,

    /// Link targets
    pub targets: Targets<B>,
}

/// Struct for batching token linking features
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,

    /// Number of predicates
    pub n_predicates: usize,
}

impl<B: Backend> dataloader::batcher::Batcher<Feature, Train<B>> for Batcher<B> {
    fn batch(&self, items: Vec<Feature>) -> Train<B> {
        let encoded: Vec<&Encoded> = items.iter().map(|item| &item.encoded).collect();
        let input = Infer::collate(&encoded, &self.device);
        let width = batch_width(items.iter().map(|item| item.encoded.seqlen));

        let cells: Vec<&[(usize, usize)]> = items.iter().map(|item| item.cells.as_slice()).collect();
        let masks: Vec<&[i64]> = items.iter().map(|item| item.mask.as_slice()).collect();

        let targets = Targets {
            links: scatter_cells(&cells, width, n_columns(self.n_predicates), &self.device),
            mask: stack_trimmed(&masks, width, &self.device).float(),
        };

        Train { input, targets }
    }
}
