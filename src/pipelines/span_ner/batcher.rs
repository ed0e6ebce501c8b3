use burn::{
    data::dataloader,
    tensor::{backend::Backend, Int, Tensor},
};
use derive_new::new;

use crate::{
    pipelines::{
        batcher::{batch_width, scatter_cells, Infer},
        encoding::Encoded,
    },
    utils::tensors::int_tensor,
};

use super::Feature;

/// Start and end targets in the layout of the head
#[derive(Clone, Debug)]
pub enum Targets<B: Backend> {
    /// `label + 1` at boundaries and 0 elsewhere, `[batch_size, seq_length]`
    Single {
        /// Span starts
        start: Tensor<B, 2, Int>,

        /// Span ends
        end: Tensor<B, 2, Int>,
    },

    /// One-hot label cells, `[batch_size, seq_length, n_labels]`
    Multi {
        /// Span starts
        start: Tensor<B, 3>,

        /// Span ends
        end: Tensor<B, 3>,
    },
}

/// A training batch for span tagging
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Bert Model input
    pub input: Infer<B>,

    /// Start and end targets
    pub targets: Targets<B>,
}

/// Struct for batching span tagging features
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,

    /// Number of entity labels
    pub n_labels: usize,

    /// Build one-hot grids instead of class ids
    pub multilabel: bool,
}

impl<B: Backend> dataloader::batcher::Batcher<Feature, Train<B>> for Batcher<B> {
    fn batch(&self, items: Vec<Feature>) -> Train<B> {
        let encoded: Vec<&Encoded> = items.iter().map(|item| &item.encoded).collect();
        let input = Infer::collate(&encoded, &self.device);
        let width = batch_width(items.iter().map(|item| item.encoded.seqlen));

        let starts: Vec<&[(usize, usize)]> = items.iter().map(|i| i.starts.as_slice()).collect();
        let ends: Vec<&[(usize, usize)]> = items.iter().map(|i| i.ends.as_slice()).collect();

        let targets = if self.multilabel {
            Targets::Multi {
                start: scatter_cells(&starts, width, self.n_labels, &self.device),
                end: scatter_cells(&ends, width, self.n_labels, &self.device),
            }
        } else {
            Targets::Single {
                start: class_ids(&starts, width, &self.device),
                end: class_ids(&ends, width, &self.device),
            }
        };

        Train { input, targets }
    }
}

/// `label + 1` at every tagged position, later cells overwrite earlier ones
fn class_ids<B: Backend>(
    cells: &[&[(usize, usize)]],
    width: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let mut values = vec![0; cells.len() * width];

    for (index, example) in cells.iter().enumerate() {
        for &(position, label) in example.iter() {
            if position < width {
                values[index * width + position] = label as i64 + 1;
            }
        }
    }

    int_tensor([cells.len(), width], values, device)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::tensors::to_i64_vec;

    #[test]
    fn test_class_ids() {
        let device = Default::default();
        let a = [(1, 0), (3, 2)];
        let b = [(2, 1), (9, 1)];

        let ids = class_ids::<burn::backend::NdArray>(&[&a[..], &b[..]], 4, &device);

        assert_eq!(to_i64_vec(ids), vec![0, 1, 0, 3, 0, 0, 2, 0]);
    }
}
