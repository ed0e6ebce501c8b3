use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::InMemDataset},
    module::AutodiffModule,
    record::CompactRecorder,
    tensor::backend::{AutodiffBackend, Backend},
    train::{metric::LossMetric, LearnerBuilder},
};

use crate::{
    datasets::cluener,
    metrics::pointer::{Span, SpanMetric},
    models::bert::global_pointer::Model,
    pipelines::{
        batcher::Infer,
        encoding::Encoded,
        session::{encode_split, require},
        Mode, Session,
    },
    utils::{renderer::Simple, tensors::to_f32_vec},
};

use super::{decode::spans_from_logits, item::encode, Batcher, Feature};

/// Fine-tune the global pointer on CLUENER, then evaluate it on the configured splits
pub async fn train<B: AutodiffBackend>(
    devices: Vec<B::Device>,
    session: &Session,
) -> anyhow::Result<()>
where
    i64: From<<B as Backend>::IntElem> + From<<B::InnerBackend as Backend>::IntElem>,
{
    let device = &devices[0];
    let config = &session.config;

    let labels = cluener::labels();
    let mut splits = session.load_splits::<cluener::Item>().await?;

    let features = |mode: Mode, records: Option<Vec<cluener::Item>>| {
        records
            .map(|records| {
                let max_seq_length = config.max_seq_length(mode);

                encode_split(mode, &records, |item| {
                    encode(&session.encoder, &labels, item, max_seq_length)
                })
            })
            .transpose()
    };

    let eval = features(Mode::Eval, splits.take(Mode::Eval))?;
    let test = features(Mode::Test, splits.take(Mode::Test))?;

    let model = if config.do_train {
        let train = require(features(Mode::Train, splits.take(Mode::Train))?, Mode::Train)?;
        let valid = require(eval.clone(), Mode::Eval)?;

        let model_config = session.model_config(&labels)?;
        let model: Model<B> =
            model_config.init_pretrained(session.files.weights.clone(), device)?;

        let (dataset_train, num_epochs) = session.train_dataset(train);

        let dataloader_train = DataLoaderBuilder::new(Batcher::<B>::new(device.clone(), labels.len()))
            .batch_size(config.train_batch_size)
            .shuffle(config.seed)
            .num_workers(config.num_workers)
            .build(dataset_train);

        let dataloader_valid =
            DataLoaderBuilder::new(Batcher::<B::InnerBackend>::new(device.clone(), labels.len()))
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

    let threshold = config.logit_threshold();

    let mut reports = Vec::new();
    for (mode, features) in session.evaluation_splits(&eval, &test) {
        if !splits.is_labelled(mode) {
            let spans = predict_all(&model, features, threshold, config.eval_batch_size, device);
            let predictions = cluener::Prediction::from_spans(&spans, &labels);
            session.save_predictions(mode, &predictions).await?;

            continue;
        }

        let metric = evaluate(&model, features, threshold, config.eval_batch_size, device);

        reports.push((
            mode,
            format!("micro f1: {:.4}\n{}", metric.micro_f1(), metric.report(&labels)),
        ));
    }

    session.save_reports(&reports).await
}

/// Decode every feature and accumulate the span metric against the gold spans
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    features: &[Feature],
    threshold: f32,
    batch_size: usize,
    device: &B::Device,
) -> SpanMetric {
    let mut metric = SpanMetric::new();
    let predicted = predict_all(model, features, threshold, batch_size, device);

    for (feature, spans) in features.iter().zip(predicted.iter()) {
        metric.update(&feature.spans, spans);
    }

    metric
}

/// Decode the spans of every feature, `batch_size` sequences at a time
pub fn predict_all<B: Backend>(
    model: &Model<B>,
    features: &[Feature],
    threshold: f32,
    batch_size: usize,
    device: &B::Device,
) -> Vec<Vec<Span>> {
    features
        .chunks(batch_size.max(1))
        .flat_map(|chunk| {
            let encoded: Vec<&Encoded> = chunk.iter().map(|feature| &feature.encoded).collect();

            predict(model, &encoded, threshold, device)
        })
        .collect()
}

/// Decode the spans of every sequence whose logit is above `threshold`
pub fn predict<B: Backend>(
    model: &Model<B>,
    encoded: &[&Encoded],
    threshold: f32,
    device: &B::Device,
) -> Vec<Vec<Span>> {
    let logits = model.logits(Infer::collate(encoded, device));
    let [_, n_labels, width, _] = logits.dims();
    let seqlens: Vec<usize> = encoded.iter().map(|e| e.seqlen).collect();

    spans_from_logits(&to_f32_vec(logits), n_labels, width, &seqlens, threshold)
