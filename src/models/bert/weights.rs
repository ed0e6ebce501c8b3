//! Read individual tensors out of a pre-trained safetensors checkpoint

use std::{collections::HashMap, path::Path};

use burn::{
    module::Param,
    nn::LinearRecord,
    tensor::{backend::Backend, Tensor},
};
use candle_core::{safetensors, DType, Device};

use crate::utils::tensors::float_tensor;

/// The word embedding matrix, `[vocab_size, hidden_size]`
pub static WORD_EMBEDDINGS: &str = "embeddings.word_embeddings.weight";

/// The tensors of a checkpoint, keyed with or without the model type prefix (`bert.`)
#[derive(Debug)]
pub struct Weights {
    tensors: HashMap<String, candle_core::Tensor>,
    prefix: String,
}

impl Weights {
    /// Load every tensor of a safetensors file onto the CPU
    pub fn load(path: &Path, model_type: &str) -> anyhow::Result<Self> {
        let tensors = safetensors::load(path, &Device::Cpu)
            .map_err(|e| anyhow!("unable to load weights from {}: {}", path.display(), e))?;

        let weights = Self {
            tensors,
            prefix: format!("{}.", model_type),
        };

        if !weights.contains(WORD_EMBEDDINGS) {
            return Err(anyhow!(
                "{} holds no {} tensor, it is not a BERT checkpoint",
                path.display(),
                WORD_EMBEDDINGS
            ));
        }

        Ok(weights)
    }

    fn get(&self, key: &str) -> Option<&candle_core::Tensor> {
        self.tensors
            .get(key)
            .or_else(|| self.tensors.get(&format!("{}{}", self.prefix, key)))
    }

    /// Whether the checkpoint has a tensor under the key
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The first of the keys present in the checkpoint
    fn first<'a>(&'a self, keys: &[&str]) -> Option<&'a candle_core::Tensor> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// A 1D tensor, `None` when every key is missing
    pub fn vector<B: Backend>(
        &self,
        keys: &[&str],
        device: &B::Device,
    ) -> anyhow::Result<Option<Tensor<B, 1>>> {
        self.first(keys)
            .map(|tensor| {
                let (shape, values) = to_values(tensor)?;
                match shape[..] {
                    [n] => Ok(float_tensor([n], values, device)),
                    _ => Err(anyhow!("{} is not a vector: {:?}", keys[0], shape)),
                }
            })
            .transpose()
    }

    /// A 2D tensor in checkpoint layout, `None` when every key is missing
    pub fn matrix<B: Backend>(
        &self,
        keys: &[&str],
        device: &B::Device,
    ) -> anyhow::Result<Option<Tensor<B, 2>>> {
        self.first(keys)
            .map(|tensor| {
                let (shape, values) = to_values(tensor)?;
                match shape[..] {
                    [rows, cols] => Ok(float_tensor([rows, cols], values, device)),
                    _ => Err(anyhow!("{} is not a matrix: {:?}", keys[0], shape)),
                }
            })
            .transpose()
    }

    /// A linear layer stored as `{name}.weight` (`[d_output, d_input]`) and `{name}.bias`
    pub fn linear<B: Backend>(
        &self,
        name: &str,
        device: &B::Device,
    ) -> anyhow::Result<Option<LinearRecord<B>>> {
        let weight = self.matrix::<B>(&[&format!("{}.weight", name)], device)?;
        let bias = self.vector::<B>(&[&format!("{}.bias", name)], device)?;

        Ok(weight.map(|weight| LinearRecord {
            weight: Param::from(weight.transpose()),
            bias: bias.map(Param::from),
        }))
    }
}

fn to_values(tensor: &candle_core::Tensor) -> anyhow::Result<(Vec<usize>, Vec<f32>)> {
    let shape = tensor.dims().to_vec();
    let values = tensor
        .to_dtype(DType::F32)
        .and_then(|t| t.flatten_all())
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|e| anyhow!("unable to read tensor: {}", e))?;

    Ok((shape, values))
}

#[cfg(test)]
pub(crate) mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::utils::tensors::to_f32_vec;

    use super::*;

    type B = NdArray;

    /// Write a checkpoint with the given `(key, shape, values)` tensors
    pub(crate) fn checkpoint(
        tensors: &[(&str, Vec<usize>, Vec<f32>)],
    ) -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");

        let map: HashMap<String, candle_core::Tensor> = tensors
            .iter()
            .map(|(key, shape, values)| {
                let tensor =
                    candle_core::Tensor::from_vec(values.clone(), shape.clone(), &Device::Cpu)
                        .unwrap();
                (key.to_string(), tensor)
            })
            .collect();
        safetensors::save(&map, &path).unwrap();

        (dir, path)
    }

    #[test]
    fn test_prefixed_keys_and_linear_layout() {
        let (_dir, path) = checkpoint(&[
            ("bert.embeddings.word_embeddings.weight", vec![3, 2], vec![0.0; 6]),
            ("cls.dense.weight", vec![3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            ("cls.dense.bias", vec![3], vec![0.1, 0.2, 0.3]),
        ]);
        let device = Default::default();
        let weights = Weights::load(&path, "bert").unwrap();

        assert!(weights.contains(WORD_EMBEDDINGS));

        let record = weights.linear::<B>("cls.dense", &device).unwrap().unwrap();
        let weight = record.weight.val();
        assert_eq!(weight.dims(), [2, 3]);
        assert_eq!(to_f32_vec(weight), vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
        assert_eq!(to_f32_vec(record.bias.unwrap().val()), vec![0.1, 0.2, 0.3]);

        assert!(weights.linear::<B>("cls.missing", &device).unwrap().is_none());
        assert!(weights.vector::<B>(&["cls.dense.weight"], &device).is_err());
    }

    #[test]
    fn test_rejects_non_bert_files() {
        let (_dir, path) = checkpoint(&[("lm_head.weight", vec![2], vec![1.0, 2.0])]);
        assert!(Weights::load(&path, "bert").is_err());

        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("model.safetensors");
        std::fs::write(&garbage, b"not a checkpoint").unwrap();
        assert!(Weights::load(&garbage, "bert").is_err());
    }
}
