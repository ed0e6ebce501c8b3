use burn::tensor::backend::Backend;

use crate::{
    datasets::cluener::Entity,
    models::bert::span_ner::Model,
    pipelines::{
        encoding::Encoded,
        session::{load_artifacts, Trained},
        Mode,
    },
};

use super::training::{predict, Decoding};

/// Tag the entities of raw texts with a model trained into `artifact_dir`
pub async fn infer<B: Backend>(
    device: B::Device,
    artifact_dir: &str,
    samples: &[String],
) -> anyhow::Result<Vec<Vec<Entity>>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let Trained {
        model,
        config,
        training,
        encoder,
    } = load_artifacts::<B, Model<B>>(artifact_dir, &device).await?;

    let labels = config.labels();
    let max_seq_length = training.max_seq_length(Mode::Test);
    let decoding = Decoding {
        threshold: training.threshold,
        top_n: training.top_n,
    };

    let encoded = samples
        .iter()
        .map(|sample| encoder.encode_chars(sample, max_seq_length))
        .collect::<Result<Vec<_>, _>>()?;
    let encoded: Vec<&Encoded> = encoded.iter().collect();

    let entities = predict(&model, &encoded, decoding, &device)
        .into_iter()
        .map(|spans| {
            spans
                .into_iter()
                .map(|span| {
                    let label = labels.label(span.label).unwrap_or_default();

                    Entity::new(label.to_string(), span.start, span.end)
                })
                .collect()
        })
        .collect();

    Ok(entities)
}
