use burn::{
    data::{
        dataloader::{batcher::Batcher as _, DataLoaderBuilder},
        dataset::InMemDataset,
    },
    module::AutodiffModule,
    record::CompactRecorder,
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
    train::{
        metric::{AccuracyMetric, LossMetric},
        LearnerBuilder,
    },
};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    datasets::documents,
    models::bert::masked_lm::Model,
    pipelines::{
        encoding::{Encoder, EncodingError},
        session::{hold_out, log_examples, require},
        Mode, Session,
    },
    utils::{
        classes::Labels,
        losses::weighted_cross_entropy,
        renderer::Simple,
        tensors::{to_f32_vec, to_i64_vec},
    },
};

use super::{item::mask_text, Batcher, Feature, Masking};

/// Continue pretraining BERT with (whole word) masked language modeling on raw documents
pub async fn train<B: AutodiffBackend>(
    devices: Vec<B::Device>,
    session: &Session,
) -> anyhow::Result<()>
where
    i64: From<<B as Backend>::IntElem> + From<<B::InnerBackend as Backend>::IntElem>,
{
    let device = &devices[0];
    let config = &session.config;
    let mut splits = session.load_splits::<documents::Item>().await?;

    let masking = Masking {
        whole_word: config.do_whole_word_mask,
        max_predictions: config.max_predictions_per_seq,
        probability: config.masked_lm_prob,
    };
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut chunked = |mode: Mode, records: Option<Vec<documents::Item>>, dupe_factor: usize| {
        records
            .map(|records| {
                let chunks = chunk_documents(&records, config.max_seq_length(mode));

                mask_chunks(
                    &session.encoder,
                    &chunks,
                    config.max_seq_length(mode),
                    masking,
                    dupe_factor,
                    &mut rng,
                )
            })
            .transpose()
    };

    let mut eval = chunked(Mode::Eval, splits.take(Mode::Eval), 1)?;
    let test = chunked(Mode::Test, splits.take(Mode::Test), 1)?;

    let model = if config.do_train {
        let records = require(splits.take(Mode::Train), Mode::Train)?;
        let max_seq_length = config.max_seq_length(Mode::Train);
        let mut chunks = chunk_documents(&records, max_seq_length);

        if eval.is_none() {
            let held_out = hold_out(&mut chunks, config.eval_split);
            log::info!(
                "No eval files, holding out {} of {} training chunks",
                held_out.len(),
                held_out.len() + chunks.len()
            );

            eval = Some(mask_chunks(
                &session.encoder,
                &held_out,
                config.max_seq_length(Mode::Eval),
                masking,
                1,
                &mut rng,
            )?);
        }

        let train = mask_chunks(
            &session.encoder,
            &chunks,
            max_seq_length,
            masking,
            config.dupe_factor,
            &mut rng,
        )?;
        log_examples(Mode::Train, &train);

        let valid = require(eval.clone(), Mode::Eval)?;

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

        let pad_id = session.encoder.pad_id as usize;

        let mut builder = LearnerBuilder::new(&session.artifact_dir)
            .metric_train_numeric(AccuracyMetric::new().with_pad_token(pad_id))
            .metric_valid_numeric(AccuracyMetric::new().with_pad_token(pad_id))
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
    for (mode, features) in session.evaluation_splits(&eval, &test) {
        let scores = evaluate(&model, features, config.eval_batch_size, device);

        reports.push((mode, scores.to_string()));
    }

    session.save_reports(&reports).await
}

/// Split every document into chunks that fit between `[CLS]` and `[SEP]`
pub fn chunk_documents(records: &[documents::Item], max_seq_length: usize) -> Vec<String> {
    let size = max_seq_length.saturating_sub(2);

    records.iter().flat_map(|item| item.chunks(size)).collect()
}


/// Mask every chunk `dupe_factor` times, each copy with its own draw
pub fn mask_chunks(
    encoder: &Encoder,
    chunks: &[String],
    max_seq_length: usize,
    masking: Masking,
    dupe_factor: usize,
    rng: &mut StdRng,
) -> Result<Vec<Feature>, EncodingError> {
    let mut features = Vec::with_capacity(chunks.len() * dupe_factor.max(1));

    for _ in 0..dupe_factor.max(1) {
        for chunk in chunks {
            features.push(mask_text(encoder, chunk, max_seq_length, masking, rng)?);
        }
    }

    Ok(features)
}

/// Masked token scores over a split
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Scores {
    /// Mean cross entropy over masked tokens
    pub loss: f64,

    /// Fraction of masked tokens predicted exactly
    pub accuracy: f64,

    /// Number of masked tokens
    pub masked: usize,
}

impl std::fmt::Display for Scores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "loss: {:.4}", self.loss)?;
        writeln!(f, "perplexity: {:.4}", self.loss.exp())?;
        write!(f, "accuracy: {:.4} over {} masked tokens", self.accuracy, self.masked)
    }
}

/// Weighted loss and accuracy over the masked positions of every feature
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    features: &[Feature],
    batch_size: usize,
    device: &B::Device,
) -> Scores {
    let batcher = Batcher::<B>::new(device.clone());

    let mut total_loss = 0.0;
    let mut correct = 0;
    let mut masked = 0;

    for chunk in features.chunks(batch_size.max(1)) {
        let batch = batcher.batch(chunk.to_vec());
        let labels = to_i64_vec(batch.targets.labels.clone());
        let weights = to_f32_vec(batch.targets.weights.clone());

        let logits = model.logits(batch.input);
        let predicted = to_i64_vec(logits.clone().argmax(2));
        let loss = weighted_cross_entropy(logits, batch.targets.labels, batch.targets.weights)
            .into_scalar()
            .elem::<f64>();

        let picked = weights.iter().filter(|w| **w > 0.0).count();
        total_loss += loss * picked as f64;
        masked += picked;

        correct += weights
            .iter()
            .zip(labels.iter().zip(predicted.iter()))
            .filter(|(w, (label, guess))| **w > 0.0 && label == guess)
            .count();
    }

    if masked == 0 {
        return Scores::default();
    }

    Scores {
        loss: total_loss / masked as f64,
        accuracy: correct as f64 / masked as f64,
        masked,
    }
}
