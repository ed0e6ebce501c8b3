use burn::tensor::backend::Backend;

use crate::{
    models::bert::text_classification::Model,
    pipelines::{
        batcher::Infer,
        encoding::Encoded,
        session::{load_artifacts, Trained},
        Mode,
    },
    utils::tensors::to_f32_vec,
};

/// The most likely class of a sentence
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// The class label
    pub label: String,

    /// Its probability
    pub score: f32,
}

/// Classify raw sentences with a model trained into `artifact_dir`
pub async fn infer<B: Backend>(
    device: B::Device,  // Device on which to perform computation (e.g., CPU or CUDA device)
    artifact_dir: &str, // Directory containing model and config files
    samples: &[String], // Text samples for inference
) -> anyhow::Result<Vec<Prediction>> {
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

    let encoded = samples
        .iter()
        .map(|sample| encoder.encode_text(sample, max_seq_length))
        .collect::<Result<Vec<_>, _>>()?;
    let encoded: Vec<&Encoded> = encoded.iter().collect();

    log::info!("Running inference on {} samples", samples.len());

    let probabilities = model.infer(Infer::collate(&encoded, &device));
    let [_, n_classes] = probabilities.dims();

    let predictions = to_f32_vec(probabilities)
        .chunks(n_classes.max(1))
        .map(|row| {
            let (class_id, score) = row
                .iter()
                .copied()
                .enumerate()
                .fold((0, f32::MIN), |best, (id, p)| if p > best.1 { (id, p) } else { best });

            Prediction {
                label: labels.label(class_id).unwrap_or_default().to_string(),
                score,
            }
        })
        .collect();

    Ok(predictions)
}
