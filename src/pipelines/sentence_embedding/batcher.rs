use burn::{data::dataloader, tensor::backend::Backend};
use derive_new::new;

use crate::pipelines::{batcher::Infer, encoding::Encoded};

use super::Sentence;

/// Batches sentences for SimCSE: every sentence appears twice in a row, so that dropout gives two
/// views of it
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

impl<B: Backend> dataloader::batcher::Batcher<Sentence, Infer<B>> for Batcher<B> {
    fn batch(&self, items: Vec<Sentence>) -> Infer<B> {
        let encoded: Vec<&Encoded> = items
            .iter()
            .flat_map(|item| [&item.encoded, &item.encoded])
            .collect();

        Infer::collate(&encoded, &self.device)
    }
}
