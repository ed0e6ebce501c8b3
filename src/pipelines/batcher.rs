use std::ops::Range;

use bert_burn::data::BertInferenceBatch;
use burn::tensor::{backend::Backend, Bool, Int, Tensor};
use derive_new::new;

use crate::utils::tensors::{float_tensor, stack_trimmed};

use super::encoding::Encoded;

/// An inference batch: the BERT input shared by every task
#[derive(Debug, Clone, new)]
pub struct Infer<B: Backend> {
    /// Tokenized text as 2D tensor: [batch_size, max_seq_length]
    pub tokens: Tensor<B, 2, Int>,

    /// Padding mask for the tokenized text containing booleans for padding locations
    pub mask_pad: Tensor<B, 2, Bool>,
}

impl<B: Backend> Infer<B> {
    /// Collate encoded sequences, trimming every row to the longest real sequence
    pub fn collate(encoded: &[&Encoded], device: &B::Device) -> Self {
        let width = batch_width(encoded.iter().map(|e| e.seqlen));

        let ids: Vec<&[i64]> = encoded.iter().map(|e| e.input_ids.as_slice()).collect();
        let masks: Vec<&[i64]> = encoded.iter().map(|e| e.attention_mask.as_slice()).collect();

        let tokens = stack_trimmed::<B>(&ids, width, device);
        let mask_pad = stack_trimmed::<B>(&masks, width, device).equal_elem(0);

        Self { tokens, mask_pad }
    }

    /// The `[batch_size, seq_length]` shape of the batch
    pub fn dims(&self) -> [usize; 2] {
        self.tokens.dims()
    }

    /// The attention mask as floats, 1 for real tokens
    pub fn attention(&self) -> Tensor<B, 2> {
        self.mask_pad.clone().bool_not().float()
    }
}

impl<B: Backend> From<Infer<B>> for BertInferenceBatch<B> {
    fn from(input: Infer<B>) -> Self {
        BertInferenceBatch {
            tokens: input.tokens,
            mask_pad: input.mask_pad,
        }
    }
}

/// The longest real sequence in a batch, at least `[CLS]` and `[SEP]`
pub fn batch_width(seqlens: impl Iterator<Item = usize>) -> usize {
    seqlens.max().unwrap_or(0).max(2)
}

/// Rows of the `index`-th sequence in a flattened `[batch, width, ..]` output that hold
/// characters, so `[CLS]`, `[SEP]` and padding are left out
pub fn char_rows(index: usize, width: usize, seqlen: usize) -> Range<usize> {
    let start = index * width + 1;
    start..(index * width + seqlen.saturating_sub(1)).max(start)
}

/// Densify sparse `(row, col)` cells into a `[batch, rows, cols]` tensor of ones and zeros.
/// Cells past the last kept row are dropped.
pub fn scatter_cells<B: Backend>(
    cells: &[&[(usize, usize)]],
    rows: usize,
    cols: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let mut values = vec![0.0; cells.len() * rows * cols];

    for (index, example) in cells.iter().enumerate() {
        for &(row, col) in example.iter() {
            if row < rows && col < cols {
                values[(index * rows + row) * cols + col] = 1.0;
            }
        }
    }

    float_tensor([cells.len(), rows, cols], values, device)
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::tensors::{to_f32_vec, to_i64_vec};

    type B = NdArray;

    fn encoded(ids: &[i64], max: usize) -> Encoded {
        let seqlen = ids.len();
        let mut input_ids = ids.to_vec();
        input_ids.resize(max, 0);

        let mut attention_mask = vec![1; seqlen];
        attention_mask.resize(max, 0);

        Encoded {
            input_ids,
            attention_mask,
            token_type_ids: vec![0; max],
            seqlen,
        }
    }

    #[test]
    fn test_collate_trims_to_longest() {
        let device = Default::default();
        let (a, b) = (encoded(&[2, 5, 6, 3], 8), encoded(&[2, 3], 8));

        let batch = Infer::<B>::collate(&[&a, &b], &device);

        assert_eq!(batch.dims(), [2, 4]);
        assert_eq!(to_i64_vec(batch.tokens.clone()), vec![2, 5, 6, 3, 2, 3, 0, 0]);
        assert_eq!(
            to_f32_vec(batch.attention()),
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_scatter_cells() {
        let device = Default::default();
        let a = [(0, 1), (1, 0), (5, 0)];
        let b = [(1, 1)];

        let tensor = scatter_cells::<B>(&[&a[..], &b[..]], 2, 2, &device);

        assert_eq!(tensor.dims(), [2, 2, 2]);
        assert_eq!(to_f32_vec(tensor), vec![0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_char_rows_skip_cls_sep_and_padding() {
        assert_eq!(char_rows(0, 6, 4), 1..3);
        assert_eq!(char_rows(1, 6, 6), 7..11);
        assert_eq!(char_rows(2, 6, 2), 13..13);
    }
}
