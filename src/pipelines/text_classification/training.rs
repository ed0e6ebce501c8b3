use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::InMemDataset},
    module::AutodiffModule,
    record::CompactRecorder,
    tensor::backend::{AutodiffBackend, Backend},
    train::{
        metric::{AccuracyMetric, LossMetric},
        LearnerBuilder,
    },
};
use serde::{Deserialize, Serialize};

use crate::{
    datasets::tnews,
    metrics::{classification, Report},
    models::bert::text_classification::Model,
    pipelines::{
        batcher::Infer,
        encoding::Encoded,
        session::{encode_split, require},
        Mode, Session,
    },
    utils::{classes::Labels, renderer::Simple, tensors::to_i64_vec},
};

use super::{item::encode, Batcher, Feature};

/// Fine-tune a sentence classifier, then evaluate it on the configured splits
pub async fn train<B: AutodiffBackend>(
    devices: Vec<B::Device>, // Devices on which to perform computation (e.g., CPU or CUDA device)
    session: &Session,       // Resolved arguments, model files and tokenizer
) -> anyhow::Result<()>
where
    i64: From<<B as Backend>::IntElem> + From<<B::InnerBackend as Backend>::IntElem>,
{
    let device = &devices[0];
    let config = &session.config;

    let label_file = config
        .label_file
        .first()
        .ok_or_else(|| anyhow!("Task {} needs a label_file", session.task))?;
    let labels = Labels::from_file(label_file).await?;
    let mut splits = session.load_splits::<tnews::Item>().await?;

    let features = |mode: Mode, records: Option<Vec<tnews::Item>>| {
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
            .metric_train_numeric(AccuracyMetric::new())
            .metric_valid_numeric(AccuracyMetric::new())
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
        if !splits.is_labelled(mode) {
            let predictions = label_all(&model, features, &labels, config.eval_batch_size, device);
            session.save_predictions(mode, &predictions).await?;

            continue;
        }

        let (micro_f1, report) = evaluate(&model, features, &labels, config.eval_batch_size, device);

        reports.push((mode, format!("micro f1: {:.4}\n{}", micro_f1, report)));
    }

    session.save_reports(&reports).await
}

/// Predict every feature and score the predictions: micro F1 and a per-class report
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    features: &[Feature],
    labels: &Labels,
    batch_size: usize,
    device: &B::Device,
) -> (f64, Report) {
    let y_true: Vec<usize> = features.iter().map(|feature| feature.label).collect();
    let y_pred = predict_all(model, features, batch_size, device);

    (
        classification::micro_f1(&y_true, &y_pred),
        classification::report(&y_true, &y_pred, labels),
    )
}

/// A predicted class, in the CLUE submission layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Line index in the input file
    pub id: usize,

    /// The predicted class name
    pub label: String,
}

/// Name the predicted class of every feature, for splits without gold labels
pub fn label_all<B: Backend>(
    model: &Model<B>,
    features: &[Feature],
    labels: &Labels,
    batch_size: usize,
    device: &B::Device,
) -> Vec<Prediction> {
    predict_all(model, features, batch_size, device)
        .into_iter()
        .enumerate()
        .map(|(id, class)| Prediction {
            id,
            label: labels.label(class).unwrap_or_default().to_string(),
        })
        .collect()
}

fn predict_all<B: Backend>(
    model: &Model<B>,
    features: &[Feature],
    batch_size: usize,
    device: &B::Device,
) -> Vec<usize> {
    features
        .chunks(batch_size.max(1))
        .flat_map(|chunk| {
            let encoded: Vec<&Encoded> = chunk.iter().map(|feature| &feature.encoded).collect();

            predict(model, &encoded, device)
        })
        .collect()
}

/// The most likely class of every sequence
pub fn predict<B: Backend>(model: &Model<B>, encoded: &[&Encoded], device: &B::Device) -> Vec<usize> {
    let logits = model.logits(Infer::collate(encoded, device));

    to_i64_vec(logits.argmax(1))
        .into_iter()
        .map(|id| id as usize)
        .collect()
}
