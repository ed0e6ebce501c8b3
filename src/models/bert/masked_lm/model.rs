use bert_burn::model::BertModel;
use burn::{
    module::{Module, Param},
    nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig, LinearRecord},
    tensor::{activation::gelu, backend::Backend, Tensor},
    train::ClassificationOutput,
};
use derive_new::new;

use crate::{
    models::bert::{
        hidden_states,
        weights::{Weights, WORD_EMBEDDINGS},
        Config, Head,
    },
    pipelines::{batcher::Infer, masked_lm::batcher::Targets},
    utils::losses::weighted_cross_entropy,
};

/// BERT with a masked language model head: a hidden transform followed by a projection onto the
/// vocabulary
#[derive(Module, Debug, new)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// Hidden transform
    pub dense: Linear<B>,

    /// Normalization after the transform
    pub layer_norm: LayerNorm<B>,

    /// Vocabulary projection
    pub decoder: Linear<B>,
}

impl<B: Backend> Head<B> for Model<B> {
    fn init_with(config: &Config, encoder: BertModel<B>, device: &B::Device) -> Self {
        let dense = LinearConfig::new(config.hidden_size, config.hidden_size).init(device);
        let layer_norm = LayerNormConfig::new(config.hidden_size)
            .with_epsilon(config.layer_norm_eps)
            .init(device);
        let decoder = LinearConfig::new(config.hidden_size, config.vocab_size).init(device);

        Self::new(encoder, dense, layer_norm, decoder)
    }

    /// Load the prediction transform from `cls.predictions` and tie the decoder to the word
    /// embeddings
    fn load_head(self, weights: &Weights, device: &B::Device) -> anyhow::Result<Self> {
        let Self {
            model,
            mut dense,
            mut layer_norm,
            mut decoder,
        } = self;

        if let Some(record) = weights.linear::<B>("cls.predictions.transform.dense", device)? {
            dense = dense.load_record(record);
        }

        let gamma = weights.vector::<B>(
            &[
                "cls.predictions.transform.LayerNorm.weight",
                "cls.predictions.transform.LayerNorm.gamma",
            ],
            device,
        )?;
        let beta = weights.vector::<B>(
            &[
                "cls.predictions.transform.LayerNorm.bias",
                "cls.predictions.transform.LayerNorm.beta",
            ],
            device,
        )?;
        if let (Some(gamma), Some(beta)) = (gamma, beta) {
            let mut record = layer_norm.clone().into_record();
            record.gamma = Param::from(gamma);
            record.beta = Param::from(beta);
            layer_norm = layer_norm.load_record(record);
        }

        if let Some(embeddings) = weights.matrix::<B>(&[WORD_EMBEDDINGS], device)? {
            let [hidden_size, vocab_size] = decoder.weight.val().dims();
            if embeddings.dims() != [vocab_size, hidden_size] {
                return Err(anyhow!(
                    "word embeddings are {:?}, the decoder expects [{}, {}]",
                    embeddings.dims(),
                    vocab_size,
                    hidden_size
                ));
            }

            let bias = weights
                .vector::<B>(
                    &["cls.predictions.bias", "cls.predictions.decoder.bias"],
                    device,
                )?
                .or_else(|| decoder.bias.as_ref().map(|bias| bias.val()));

            decoder = decoder.load_record(LinearRecord {
                weight: Param::from(embeddings.transpose()),
                bias: bias.map(Param::from),
            });
        }

        Ok(Self::new(model, dense, layer_norm, decoder))
    }
}

impl<B: Backend> Model<B> {
    /// Vocabulary logits, `[batch_size, seq_length, vocab_size]`
    pub fn logits(&self, input: Infer<B>) -> Tensor<B, 3> {
        let hidden = self.dense.forward(hidden_states(&self.model, input));
        let hidden = self.layer_norm.forward(gelu(hidden));

        self.decoder.forward(hidden)
    }

    /// Defines forward pass for training. The labels hold the original ids at masked positions
    /// and padding elsewhere, so that the accuracy metric skips unmasked tokens.
    pub fn forward(&self, input: Infer<B>, targets: Targets<B>) -> ClassificationOutput<B>
    where
        i64: std::convert::From<<B as burn::tensor::backend::Backend>::IntElem>,
    {
        let logits = self.logits(input);
        let [batch_size, seq_length, vocab_size] = logits.dims();

        let loss = weighted_cross_entropy(logits.clone(), targets.labels.clone(), targets.weights);

        ClassificationOutput {
            loss,
            output: logits.reshape([batch_size * seq_length, vocab_size]),
            targets: targets.labels.reshape([batch_size * seq_length]),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use crate::{
        models::bert::{config::tests::tiny_config, weights::tests::checkpoint},
        utils::tensors::to_f32_vec,
    };

    use super::*;

    type B = NdArray;

    #[test]
    fn test_load_head_from_checkpoint() {
        let device = Default::default();
        let (vocab_size, hidden_size) = (5, 8);
        let config = tiny_config(vocab_size, 0);
        let model: Model<B> = config.init(&device);

        let embeddings: Vec<f32> = (0..vocab_size * hidden_size).map(|i| i as f32).collect();
        let dense: Vec<f32> = (0..hidden_size * hidden_size).map(|i| i as f32 / 10.0).collect();
        let (_dir, path) = checkpoint(&[
            (
                "bert.embeddings.word_embeddings.weight",
                vec![vocab_size, hidden_size],
                embeddings.clone(),
            ),
            (
                "cls.predictions.transform.dense.weight",
                vec![hidden_size, hidden_size],
                dense.clone(),
            ),
            (
                "cls.predictions.transform.dense.bias",
                vec![hidden_size],
                vec![0.5; hidden_size],
            ),
            (
                "cls.predictions.transform.LayerNorm.gamma",
                vec![hidden_size],
                vec![2.0; hidden_size],
            ),
            (
                "cls.predictions.transform.LayerNorm.beta",
                vec![hidden_size],
                vec![-1.0; hidden_size],
            ),
            ("cls.predictions.bias", vec![vocab_size], vec![0.25; vocab_size]),
        ]);
        let weights = Weights::load(&path, "bert").unwrap();

        let model = model.load_head(&weights, &device).unwrap();

        let decoder = model.decoder.weight.val();
        assert_eq!(decoder.dims(), [hidden_size, vocab_size]);
        assert_eq!(to_f32_vec(decoder.transpose()), embeddings);
        assert_eq!(
            to_f32_vec(model.decoder.bias.unwrap().val()),
            vec![0.25; vocab_size]
        );
        assert_eq!(to_f32_vec(model.dense.weight.val().transpose()), dense);
        assert_eq!(to_f32_vec(model.dense.bias.unwrap().val()), vec![0.5; hidden_size]);

        // Normalized rows come out as gamma * 0 + beta when every value is equal
        let [batch_size, seq_length] = [1, 2];
        let constant = Tensor::<B, 3>::ones([batch_size, seq_length, hidden_size], &device);
        let normalized = model.layer_norm.forward(constant);
        assert_eq!(to_f32_vec(normalized), vec![-1.0; seq_length * hidden_size]);
    }

    #[test]
    fn test_head_without_transform_keeps_random_layers() {
        let device = Default::default();
        let config = tiny_config(4, 0);
        let model: Model<B> = config.init(&device);
        let dense_before = to_f32_vec(model.dense.weight.val());

        let (_dir, path) = checkpoint(&[(
            "embeddings.word_embeddings.weight",
            vec![4, 8],
            vec![1.0; 32],
        )]);
        let weights = Weights::load(&path, "bert").unwrap();
        let model = model.load_head(&weights, &device).unwrap();

        assert_eq!(to_f32_vec(model.dense.weight.val()), dense_before);
        assert_eq!(to_f32_vec(model.decoder.weight.val()), vec![1.0; 32]);

        let (_dir, path) = checkpoint(&[(
            "embeddings.word_embeddings.weight",
            vec![3, 8],
            vec![1.0; 24],
        )]);
        let weights = Weights::load(&path, "bert").unwrap();
        assert!(config.init::<B, Model<B>>(&device).load_head(&weights, &device).is_err());
    }
}
