use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::InMemDataset},
    module::AutodiffModule,
    record::CompactRecorder,
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
    train::{metric::LossMetric, LearnerBuilder},
};

use crate::{
    datasets::cluener,
    metrics::pointer::{Span, SpanMetric},
    models::bert::span_ner::Model,
    pipelines::{
        batcher::{char_rows, Infer},
        encoding::Encoded,
        session::{encode_split, require},
        Mode, Session,
    },
    utils::{
        renderer::Simple,
        tensors::{to_f32_vec, to_i64_vec},
    },
};

use super::{
    decode::{decode_multi, decode_single},
    item::encode,
    Batcher, Feature,
};

/// Decoding settings
#[derive(Clone, Copy, Debug)]
pub struct Decoding {
    /// Probability threshold of the multi-label head
    pub threshold: f32,

    /// Ends paired with every start
    pub top_n: usize,
}

/// Fine-tune the span tagger on CLUENER, then evaluate it on the configured splits
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

        let batcher_train = Batcher::<B>::new(device.clone(), labels.len(), config.with_multilabel);
        let batcher_valid =
            Batcher::<B::InnerBackend>::new(device.clone(), labels.len(), config.with_multilabel);

        let dataloader_train = DataLoaderBuilder::new(batcher_train)
            .batch_size(config.train_batch_size)
            .shuffle(config.seed)
            .num_workers(config.num_workers)
            .build(dataset_train);

        let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
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

    let decoding = Decoding {
        threshold: config.threshold,
        top_n: config.top_n,
    };

    let mut reports = Vec::new();
    for (mode, features) in session.evaluation_splits(&eval, &test) {
        if !splits.is_labelled(mode) {
            let spans = predict_all(&model, features, decoding, config.eval_batch_size, device);
            let predictions = cluener::Prediction::from_spans(&spans, &labels);
            session.save_predictions(mode, &predictions).await?;

            continue;
        }

        let metric = evaluate(&model, features, decoding, config.eval_batch_size, device);

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
    decoding: Decoding,
    batch_size: usize,
    device: &B::Device,
) -> SpanMetric {
    let mut metric = SpanMetric::new();
    let predicted = predict_all(model, features, decoding, batch_size, device);

    for (feature, spans) in features.iter().zip(predicted.iter()) {
        metric.update(&feature.spans, spans);
    }

    metric
}

/// Decode the spans of every feature, `batch_size` sequences at a time
pub fn predict_all<B: Backend>(
    model: &Model<B>,
    features: &[Feature],
    decoding: Decoding,
    batch_size: usize,
    device: &B::Device,
) -> Vec<Vec<Span>> {
    features
        .chunks(batch_size.max(1))
        .flat_map(|chunk| {
            let encoded: Vec<&Encoded> = chunk.iter().map(|feature| &feature.encoded).collect();

            predict(model, &encoded, decoding, device)
        })
        .collect()
}

/// Decode the spans of every sequence, as character offsets
pub fn predict<B: Backend>(
    model: &Model<B>,
    encoded: &[&Encoded],
    decoding: Decoding,
    device: &B::Device,
) -> Vec<Vec<Span>> {
    let seqlens: Vec<usize> = encoded.iter().map(|e| e.seqlen).collect();
    let (start, end) = model.infer(Infer::collate(encoded, device));
    let [_, width, n_outputs] = start.dims();

    if model.multilabel {
        spans_multi(
            &to_f32_vec(start),
            &to_f32_vec(end),
            width,
            n_outputs,
            &seqlens,
            decoding,
        )
    } else {
        let classes = |probs: Tensor<B, 3>| -> Vec<usize> {
            to_i64_vec(probs.argmax(2))
                .into_iter()
                .map(|class| class as usize)
                .collect()
        };

        spans_single(&classes(start), &classes(end), width, &seqlens, decoding.top_n)
    }
}

/// Decode a `[batch, width]` grid of start and end classes into character spans per sequence
pub fn spans_single(
    starts: &[usize],
    ends: &[usize],
    width: usize,
    seqlens: &[usize],
    top_n: usize,
) -> Vec<Vec<Span>> {
    seqlens
        .iter()
        .enumerate()
        .map(|(index, &seqlen)| {
            let rows = char_rows(index, width, seqlen);
            decode_single(&starts[rows.clone()], &ends[rows], top_n)
        })
        .collect()
}

/// Decode `[batch, width, n_labels]` start and end probabilities into character spans
pub fn spans_multi(
    starts: &[f32],
    ends: &[f32],
    width: usize,
    n_labels: usize,
    seqlens: &[usize],
    decoding: Decoding,
) -> Vec<Vec<Span>> {
    seqlens
        .iter()
        .enumerate()
        .map(|(index, &seqlen)| {
            let rows = char_rows(index, width, seqlen);
            let range = rows.start * n_labels..rows.end * n_labels;

            decode_multi(
                &starts[range.clone()],
                &ends[range],
                n_labels,
                decoding.threshold,
                decoding.top_n,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_spans_single_shift_past_cls() {
        // Two sequences of width 6: [CLS] 3 chars [SEP] [PAD], then [CLS] 4 chars [SEP]
        #[rustfmt::skip]
        let starts = [
            1, 1, 0, 0, 0, 0,
            0, 0, 2, 0, 0, 1,
        ];
        #[rustfmt::skip]
        let ends = [
            1, 0, 1, 0, 1, 1,
            0, 0, 0, 0, 2, 1,
        ];

        let spans = spans_single(&starts, &ends, 6, &[5, 6], 1);

        assert_eq!(
            spans,
            vec![vec![Span::new(0, 0, 1)], vec![Span::new(1, 1, 3)]]
        );
    }

    #[test]
    fn test_spans_single_end_on_sep_is_dropped() {
        // The only matching end sits on [SEP]
        let starts = [0, 1, 0, 0];
        let ends = [0, 0, 0, 1];

        assert_eq!(spans_single(&starts, &ends, 4, &[4], 1), vec![vec![]]);
    }

    #[test]
    fn test_spans_multi_rows() {
        let decoding = Decoding {
            threshold: 0.5,
            top_n: 1,
        };
        // Two labels, width 4: [CLS] 2 chars [SEP], then [CLS] 1 char [SEP] [PAD]
        #[rustfmt::skip]
        let starts = [
            0.9, 0.9, 0.0, 0.9, 0.0, 0.0, 0.9, 0.9,
            0.0, 0.0, 0.0, 0.9, 0.0, 0.0, 0.9, 0.9,
        ];
        #[rustfmt::skip]
        let ends = [
            0.9, 0.9, 0.0, 0.0, 0.0, 0.9, 0.9, 0.9,
            0.0, 0.0, 0.0, 0.9, 0.9, 0.9, 0.9, 0.9,
        ];

        let spans = spans_multi(&starts, &ends, 4, 2, &[4, 3], decoding);

        assert_eq!(
            spans,
            vec![vec![Span::new(1, 0, 1)], vec![Span::new(1, 0, 0)]]
        );
    }
}
