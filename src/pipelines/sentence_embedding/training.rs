use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::InMemDataset},
    module::AutodiffModule,
    record::CompactRecorder,
    tensor::backend::{AutodiffBackend, Backend},
    train::{metric::LossMetric, LearnerBuilder},
};

use crate::{
    datasets::{documents, pairs},
    metrics::correlation::{cosine, spearman},
    models::bert::sentence_embedding::Model,
    pipelines::{
        batcher::Infer,
        encoding::Encoded,
        session::{encode_split, hold_out, load_split, require},
        Mode, Session,
    },
    utils::{classes::Labels, renderer::Simple, tensors::to_f32_vec},
};

use super::{
    item::{encode_document, encode_pair, pair_sentences},
    Batcher, Pair, Sentence,
};

/// Train sentence embeddings with SimCSE on raw documents, then score labelled pairs when there
/// are any
pub async fn train<B: AutodiffBackend>(
    devices: Vec<B::Device>,
    session: &Session,
) -> anyhow::Result<()>
where
    i64: From<<B as Backend>::IntElem> + From<<B::InnerBackend as Backend>::IntElem>,
{
    let device = &devices[0];
    let config = &session.config;
    let max_samples = config.max_samples;

    let (train, eval, test) = futures::try_join!(
        load_split::<documents::Item>(&config.train_file, max_samples),
        load_split::<pairs::Item>(&config.eval_file, max_samples),
        load_split::<pairs::Item>(&config.test_file, max_samples),
    )?;

    let encode_pairs = |mode: Mode, records: Option<Vec<pairs::Item>>| {
        records
            .map(|records| {
                let max_seq_length = config.max_seq_length(mode);

                encode_split(mode, &records, |item| {
                    encode_pair(&session.encoder, item, max_seq_length)
                })
            })
            .transpose()
    };

    let eval = encode_pairs(Mode::Eval, eval)?;
    let test = encode_pairs(Mode::Test, test)?;

    let model = if config.do_train {
        let train = require(train, Mode::Train)?;
        let max_seq_length = config.max_seq_length(Mode::Train);
        let mut train = encode_split(Mode::Train, &train, |item| {
            encode_document(&session.encoder, item, max_seq_length)
        })?;
        let valid = validation_sentences(&mut train, eval.as_deref(), config.eval_split);

        // The embedding head has no labels
        let model_config = session.model_config(&Labels::default())?;
        let model: Model<B> =
            model_config.init_pretrained(session.files.weights.clone(), device)?;

        let (dataset_train, num_epochs) = session.train_dataset(train);

        let dataloader_train = DataLoaderBuilder::new(Batcher::<B>::new(device.clone()))
            .batch_size(config.train_batch_size)
            .shuffle(config.seed)
            .num_workers(config.num_workers)
            .build(dataset_train);

        let dataloader_valid =
            DataLoaderBuilder::new(Batcher::<B::InnerBackend>::new(device.clone()))
                .batch_size(config.eval_batch_size)
                .num_workers(config.num_workers)
                .build(InMemDataset::new(valid));

        let mut builder = LearnerBuilder::new(&session.artifact_dir)
            .metric_train_numeric(LossMetric::new())
            .metric_valid_numeric(LossMetric::new())
            .with_file_checkpointer(CompactRecorder::new())
            .devices(devices.clone())
            .num_epochs(num_epochs)
            .grads_accumulation(config.gradient_accumulation_steps);

        if !session.use_tui {
            builder = builder.renderer(Simple::new());
        }

        let learner = builder
            .summary()
            .build(model, session.optimizer().init(), config.learning_rate);

        let model_trained = learner.fit(dataloader_train, dataloader_valid);

        session.save_model::<B, _>(model_trained.clone(), &model_config)?;

        model_trained.valid()
    } else {
        let (model, _) = session
            .load_trained::<B::InnerBackend, Model<B::InnerBackend>>(device)
            .await?;

        model
    };

    let mut reports = Vec::new();
    for (mode, labelled) in session.evaluation_splits(&eval, &test) {
        let n_pairs = labelled.len();
        let report = match evaluate(&model, labelled, config.eval_batch_size, device) {
            Some(correlation) => format!("spearman: {:.4} over {} pairs", correlation, n_pairs),
            None => format!("spearman: undefined over {} pairs", n_pairs),
        };

        reports.push((mode, report));
    }

    session.save_reports(&reports).await
}

/// Validation sentences: both sides of the labelled pairs when given, otherwise the last
/// `fraction` of the training sentences
pub fn validation_sentences(
    train: &mut Vec<Sentence>,
    pairs: Option<&[Pair]>,
    fraction: f64,
) -> Vec<Sentence> {
    match pairs {
        Some(pairs) => pair_sentences(pairs),
        None => {
            let held_out = hold_out(train, fraction);
            log::info!(
                "No eval files, holding out {} of {} training sentences",
                held_out.len(),
                held_out.len() + train.len()
            );

            held_out
        }
    }
}

/// Spearman correlation between the cosine similarity of each pair's embeddings and its gold
/// score. `None` when fewer than two pairs or a constant ranking make it undefined.
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    pairs: &[Pair],
    batch_size: usize,
    device: &B::Device,
) -> Option<f64> {
    let mut predicted = Vec::with_capacity(pairs.len());

    for chunk in pairs.chunks(batch_size.max(1)) {
        let first: Vec<&Encoded> = chunk.iter().map(|pair| &pair.first).collect();
        let second: Vec<&Encoded> = chunk.iter().map(|pair| &pair.second).collect();

        let first = embed(model, &first, device);
        let second = embed(model, &second, device);

        predicted.extend(first.iter().zip(second.iter()).map(|(a, b)| cosine(a, b)));
    }

    let gold: Vec<f64> = pairs.iter().map(|pair| pair.score as f64).collect();

    spearman(&predicted, &gold)
}

/// One embedding per sequence
pub fn embed<B: Backend>(model: &Model<B>, encoded: &[&Encoded], device: &B::Device) -> Vec<Vec<f32>> {
    let embeddings = model.embed(Infer::collate(encoded, device));
    let [_, size] = embeddings.dims();

    to_f32_vec(embeddings)
        .chunks(size.max(1))
        .map(<[f32]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{models::bert::config::tests::tiny_config, pipelines::encoding::tests::encoder};

    type B = NdArray;

    fn sentences(encoder: &crate::pipelines::encoding::Encoder, texts: &[&str]) -> Vec<Sentence> {
        texts
            .iter()
            .map(|text| Sentence {
                encoded: encoder.encode_text(text, 8).unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_validation_without_eval_file() {
        let (_dir, encoder) = encoder(true);
        let mut train = sentences(&encoder, &["北京", "大学", "是", "北京大学"]);

        let valid = validation_sentences(&mut train, None, 0.25);

        assert_eq!(valid, sentences(&encoder, &["北京大学"]));
        assert_eq!(train.len(), 3);
    }

    #[test]
    fn test_validation_from_pairs() {
        let (_dir, encoder) = encoder(true);
        let mut train = sentences(&encoder, &["北京", "大学"]);
        let pair = encode_pair(&encoder, &pairs::Item::new("北京".into(), "是".into(), 1.0), 8)
            .unwrap();

        let valid = validation_sentences(&mut train, Some(&[pair]), 0.5);

        assert_eq!(valid, sentences(&encoder, &["北京", "是"]));
        assert_eq!(train.len(), 2);
    }

    #[test]
    fn test_evaluate_spearman() {
        let (_dir, encoder) = encoder(true);
        let device = Default::default();
        let model: Model<B> = tiny_config(16, 0).init(&device);

        let items = [
            ("北京", "北京", 1.0),
            ("大学", "大学", 1.0),
            ("北京", "是", 0.0),
            ("ab", "大学是", 0.0),
        ];
        let labelled: Vec<Pair> = items
            .iter()
            .map(|(first, second, score)| {
                let item = pairs::Item::new(first.to_string(), second.to_string(), *score);
                encode_pair(&encoder, &item, 8).unwrap()
            })
            .collect();

        // Identical sentences embed identically, so they rank above the other pairs
        let correlation = evaluate(&model, &labelled, 4, &device).unwrap();
        assert!(correlation > 0.8, "{}", correlation);

        let one_by_one = evaluate(&model, &labelled, 1, &device).unwrap();
        assert!(one_by_one > 0.8, "{}", one_by_one);

        assert!(evaluate(&model, &labelled[..1], 4, &device).is_none());
    }
}
