use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::InMemDataset},
    module::AutodiffModule,
    record::CompactRecorder,
    tensor::backend::{AutodiffBackend, Backend},
    train::{metric::LossMetric, LearnerBuilder},
};

use crate::{
    datasets::relation,
    metrics::spo::{SpoMetric, Triple},
    models::bert::relation_extraction::Model,
    pipelines::{
        batcher::Infer,
        encoding::Encoded,
        session::{encode_split, require},
        Mode, Session,
    },
    utils::{classes::Labels, renderer::Simple, tensors::to_f32_vec},
};

use super::{decode::triples_from_rows, item::encode, Batcher, Feature};

/// Fine-tune the token linker, then evaluate it on the configured splits
pub async fn train<B: AutodiffBackend>(
    devices: Vec<B::Device>,
    session: &Session,
) -> anyhow::Result<()>
where
    i64: From<<B as Backend>::IntElem> + From<<B::InnerBackend as Backend>::IntElem>,
{
    let device = &devices[0];
    let config = &session.config;

    let schema = config
        .label_file
        .first()
        .ok_or_else(|| anyhow!("Task {} needs a label_file with the relation schema", session.task))?;
    let labels = Labels::from_relation_file(schema).await?;
    let mut splits = session.load_splits::<relation::Item>().await?;

    let features = |mode: Mode, records: Option<Vec<relation::Item>>| {
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

    let mut reports = Vec::new();
    for (mode, features) in session.evaluation_splits(&eval, &test) {
        let metric = evaluate(
            &model,
            features,
            labels.len(),
            config.threshold,
            config.eval_batch_size,
            device,
        );

        reports.push((
            mode,
            format!("macro f1: {:.4}\n{}", metric.macro_f1(), metric.report(&labels)),
        ));
    }

    session.save_reports(&reports).await
}

/// Decode every feature and accumulate the triple metric against the encoded triples
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    features: &[Feature],
    n_predicates: usize,
    threshold: f32,
    batch_size: usize,
    device: &B::Device,
) -> SpoMetric {
    let mut metric = SpoMetric::new();

    for chunk in features.chunks(batch_size.max(1)) {
        let encoded: Vec<&Encoded> = chunk.iter().map(|feature| &feature.encoded).collect();
        let predicted = predict(model, &encoded, n_predicates, threshold, device);

        for (feature, triples) in chunk.iter().zip(predicted.iter()) {
            metric.update(&feature.triples, triples);
        }
    }

    metric
}

/// Extract the triples of every sequence from the link probabilities
pub fn predict<B: Backend>(
    model: &Model<B>,
    encoded: &[&Encoded],
    n_predicates: usize,
    threshold: f32,
    device: &B::Device,
) -> Vec<Vec<Triple>> {
    let probabilities = model.infer(Infer::collate(encoded, device));
    let [_, width, columns] = probabilities.dims();
    let seqlens: Vec<usize> = encoded.iter().map(|e| e.seqlen).collect();

    triples_from_rows(
        &to_f32_vec(probabilities),
        width,
        columns,
        &seqlens,
        n_predicates,
        threshold,
    )
}
