use burn::{
    data::dataloader,
    tensor::{backend::Backend, Int, Tensor},
};
use derive_new::new;

use crate::{
    pipelines::{
        batcher::{batch_width, Infer},
        encoding::Encoded,
    },
    utils::tensors::stack_trimmed,
};

use super::Feature;

/// BIO and entity type targets, each `[batch_size, seq_length]`
#[derive(Clone, Debug, new)]
pub struct Targets<B: Backend> {
    /// BIO tags
    pub seqs: Tensor<B, 2, Int>,

    /// Entity label ids
    pub ents: Tensor<B, 2, Int>,
}

/// A training batch for cascaded tagging
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Bert Model input
    pub input: Infer<B>,

    /// Tag targets
    pub targets: Targets<B>,
}

/// Struct for batching cascaded tagging features
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

impl<B: Backend> dataloader::batcher::Batcher<Feature, Train<B>> for Batcher<B> {
    fn batch(&self, items: Vec<Feature>) -> Train<B> {
        let encoded: Vec<&Encoded> = items.iter().map(|item| &item.encoded).collect();
        let input = Infer::collate(&encoded, &self.device);
        let width = batch_width(items.iter().map(|item| item.encoded.seqlen));

        let seqs: Vec<&[i64]> = items.iter().map(|item| item.seq_tags.as_slice()).collect();
        let ents: Vec<&[i64]> = items.iter().map(|item| item.ent_tags.as_slice()).collect();

        let targets = Targets {
            seqs: stack_trimmed(&seqs, width, &self.device),
            ents: stack_trimmed(&ents, width, &self.device),
        };

        Train { input, targets }
    }
}
