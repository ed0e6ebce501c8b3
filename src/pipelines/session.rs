use std::{fmt::Debug, sync::Arc};

use burn::{
    config::Config as _,
    data::dataset::{transform::SamplerDataset, Dataset, InMemDataset},
    grad_clipping::GradientClippingConfig,
    module::Module,
    optim::AdamWConfig,
    record::{CompactRecorder, Recorder},
    tensor::backend::Backend,
};
use serde::Serialize;

use crate::{
    cli::Task,
    datasets::{Corpus, DatasetError, LoadableDataset, Record},
    models::bert::{self, Head},
    utils::{
        classes::Labels,
        files::write_json_lines,
        hugging_face::{resolve_model, ModelFiles},
    },
};

use super::{
    config::{Mode, Training},
    encoding::Encoder,
};

/// Number of encoded examples logged for every split
const LOGGED_EXAMPLES: usize = 5;

/// Everything a task needs before building features: resolved arguments, the pre-trained model
/// files, the tokenizer and the artifact directory
pub struct Session {
    /// The task being trained
    pub task: Task,

    /// Training arguments
    pub config: Training,

    /// `<output_dir>/<task>`
    pub artifact_dir: String,

    /// The pre-trained model files
    pub files: ModelFiles,

    /// The tokenizer
    pub encoder: Encoder,

    /// Use the terminal dashboard instead of plain log lines
    pub use_tui: bool,
}

/// The records of every configured split
pub struct Splits<I> {
    /// Training records
    pub train: Option<Vec<I>>,

    /// Validation records
    pub eval: Option<Vec<I>>,

    /// Test records
    pub test: Option<Vec<I>>,

    /// The splits whose every record carries gold annotations
    pub labelled: Vec<Mode>,
}

impl<I> Splits<I> {
    /// Whether the split was loaded with gold annotations on every record
    pub fn is_labelled(&self, mode: Mode) -> bool {
        self.labelled.contains(&mode)
    }

    /// The records of one split
    pub fn take(&mut self, mode: Mode) -> Option<Vec<I>> {
        match mode {
            Mode::Train => self.train.take(),
            Mode::Eval => self.eval.take(),
            Mode::Test => self.test.take(),
        }
    }
}

impl Session {
    /// Validate the arguments, create the artifact directory and resolve the model and tokenizer
    pub async fn prepare(task: Task, config: Training, use_tui: bool) -> anyhow::Result<Self> {
        config.validate()?;

        let artifact_dir = format!("{}/{}", config.output_dir, task);
        tokio::fs::create_dir_all(&artifact_dir)
            .await
            .map_err(|e| anyhow!("Unable to create {}: {}", artifact_dir, e))?;

        if config.do_train {
            config
                .save(format!("{artifact_dir}/training.json"))
                .map_err(|e| anyhow!("Unable to save training arguments: {}", e))?;
        }

        let files = resolve_model(&config.model_name_or_path).await?;
        let encoder = Encoder::load(&files, &config.model_name_or_path, config.do_lower_case)?;

        log::info!("Task {} writes artifacts to {}", task, artifact_dir);

        Ok(Self {
            task,
            config,
            artifact_dir,
            files,
            encoder,
            use_tui,
        })
    }

    /// Load every configured split concurrently
    pub async fn load_splits<I: Record>(&self) -> Result<Splits<I>, DatasetError> {
        let max_samples = self.config.max_samples;

        let (train, eval, test) = futures::try_join!(
            load_split::<I>(self.config.files(Mode::Train), max_samples),
            load_split::<I>(self.config.files(Mode::Eval), max_samples),
            load_split::<I>(self.config.files(Mode::Test), max_samples),
        )?;

        let labelled = [(Mode::Train, &train), (Mode::Eval, &eval), (Mode::Test, &test)]
            .into_iter()
            .filter(|(_, records)| all_labelled(records.as_deref()))
            .map(|(mode, _)| mode)
            .collect();

        Ok(Splits {
            train,
            eval,
            test,
            labelled,
        })
    }

    /// The head configuration for a label vocabulary
    pub fn model_config(&self, labels: &Labels) -> anyhow::Result<bert::Config> {
        let config = bert::Config::load_pretrained(
            self.files.config.clone(),
            labels,
            self.task.uses_pooler(),
        )?;

        Ok(config
            .with_with_multilabel(self.config.with_multilabel)
            .with_head_size(self.config.head_size)
            .with_projection_size(self.config.projection_size)
            .with_temperature(self.config.temperature))
    }

    /// AdamW with the configured epsilon, weight decay and gradient norm clipping
    pub fn optimizer(&self) -> AdamWConfig {
        AdamWConfig::new()
            .with_epsilon(self.config.adam_epsilon)
            .with_weight_decay(self.config.weight_decay)
            .with_grad_clipping(Some(GradientClippingConfig::Norm(
                self.config.max_grad_norm,
            )))
    }

    /// The training dataset and epoch count. With `max_steps`, a single epoch samples exactly
    /// enough items for that many optimizer steps.
    pub fn train_dataset<F>(&self, features: Vec<F>) -> (Arc<dyn Dataset<F>>, usize)
    where
        F: Clone + Send + Sync + 'static,
    {
        let dataset = InMemDataset::new(features);

        match self.config.max_steps {
            Some(steps) => {
                let size = steps
                    * self.config.train_batch_size
                    * self.config.gradient_accumulation_steps;

                log::info!("Training for {} steps over {} sampled items", steps, size);

                (Arc::new(SamplerDataset::new(dataset, size)), 1)
            }
            None => (Arc::new(dataset), self.config.num_epochs),
        }
    }

    /// Save the head configuration and the trained weights
    pub fn save_model<B: Backend, M: Module<B>>(
        &self,
        model: M,
        config: &bert::Config,
    ) -> anyhow::Result<()> {
        config
            .save(format!("{}/config.json", self.artifact_dir))
            .map_err(|e| anyhow!("Unable to save model config: {}", e))?;

        CompactRecorder::new()
            .record(
                model.into_record(),
                format!("{}/model", self.artifact_dir).into(),
            )
            .map_err(|e| anyhow!("Unable to save trained model weights: {}", e))?;

        log::info!("Saved model to {}", self.artifact_dir);

        Ok(())
    }

    /// Log and save the evaluation reports of every evaluated split
    pub async fn save_reports(&self, reports: &[(Mode, String)]) -> anyhow::Result<()> {
        if reports.is_empty() {
            return Ok(());
        }

        let mut content = String::new();
        for (mode, report) in reports {
            log::info!("{} report for {}:\n{}", mode, self.task, report);

            content.push_str(&format!("== {} ==\n{}\n", mode, report));
        }

        let path = format!("{}/report.txt", self.artifact_dir);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| anyhow!("Unable to write {}: {}", path, e))?;

        Ok(())
    }

    /// Save the predictions for a split without gold annotations as JSON lines
    pub async fn save_predictions<T: Serialize>(
        &self,
        mode: Mode,
        predictions: &[T],
    ) -> anyhow::Result<()> {
        let path = format!("{}/{}_predictions.json", self.artifact_dir, mode);

        log::info!(
            "The {} split has no gold annotations, writing {} predictions to {}",
            mode,
            predictions.len(),
            path
        );

        Ok(write_json_lines(&path, predictions).await?)
    }

    /// The model to evaluate when training is skipped: the one saved by an earlier run
    pub async fn load_trained<B: Backend, M: Head<B>>(
        &self,
        device: &B::Device,
    ) -> anyhow::Result<(M, bert::Config)> {
        log::info!("Loading trained model from {}", self.artifact_dir);

        let trained = load_artifacts::<B, M>(&self.artifact_dir, device).await?;

        Ok((trained.model, trained.config))
    }

    /// The encoded splits evaluated after fitting, in `eval`, `test` order
    pub fn evaluation_splits<'a, F>(
        &self,
        eval: &'a Option<Vec<F>>,
        test: &'a Option<Vec<F>>,
    ) -> Vec<(Mode, &'a [F])> {
        let requested = [
            (Mode::Eval, self.config.do_eval, eval),
            (Mode::Test, self.config.do_test, test),
        ];

        requested
            .into_iter()
            .filter(|(_, enabled, _)| *enabled)
            .filter_map(|(mode, _, features)| match features {
                Some(features) => Some((mode, features.as_slice())),
                None => {
                    log::warn!("No {} files configured, skipping {} evaluation", mode, mode);
                    None
                }
            })
            .collect()
    }
}

/// Records of a split that must be present
pub fn require<I>(records: Option<Vec<I>>, mode: Mode) -> anyhow::Result<Vec<I>> {
    records.ok_or_else(|| anyhow!("Training needs {} files", mode))
}

/// Whether a split is present and every record carries gold annotations
pub fn all_labelled<I: Record>(records: Option<&[I]>) -> bool {
    records.is_some_and(|records| records.iter().all(Record::is_labelled))
}

/// Remove and return the last `fraction` of the items, at least one when there are two or more
pub fn hold_out<T>(items: &mut Vec<T>, fraction: f64) -> Vec<T> {
    let wanted = (items.len() as f64 * fraction).round() as usize;
    let count = if items.len() > 1 {
        wanted.clamp(1, items.len() - 1)
    } else {
        0
    };

    items.split_off(items.len() - count)
}

/// Encode every record of a split, logging the first features
pub fn encode_split<I, F, E>(
    mode: Mode,
    records: &[I],
    encode: impl Fn(&I) -> Result<F, E>,
) -> Result<Vec<F>, E>
where
    F: Debug,
{
    let features = records.iter().map(encode).collect::<Result<Vec<_>, _>>()?;

    log_examples(mode, &features);

    Ok(features)
}

/// A trained model loaded back from its artifact directory
pub struct Trained<M> {
    /// The model with its trained weights
    pub model: M,

    /// The head configuration
    pub config: bert::Config,

    /// The arguments the model was trained with
    pub training: Training,

    /// The tokenizer of the base model
    pub encoder: Encoder,
}

/// Load `config.json`, `training.json` and the trained weights from an artifact directory
pub async fn load_artifacts<B: Backend, M: Head<B>>(
    artifact_dir: &str,
    device: &B::Device,
) -> anyhow::Result<Trained<M>> {
    let config = bert::Config::load(format!("{artifact_dir}/config.json"))
        .map_err(|e| anyhow!("Unable to load config file: {}", e))?;

    let training = Training::load(format!("{artifact_dir}/training.json"))
        .map_err(|e| anyhow!("Unable to load training arguments: {}", e))?;

    let record: M::Record = CompactRecorder::new()
        .load(format!("{artifact_dir}/model").into(), device)
        .map_err(|e| anyhow!("Unable to load trained model weights: {}", e))?;

    let model = config.init::<B, M>(device).load_record(record);

    let files = resolve_model(&training.model_name_or_path).await?;
    let encoder = Encoder::load(&files, &training.model_name_or_path, training.do_lower_case)?;

    Ok(Trained {
        model,
        config,
        training,
        encoder,
    })
}

/// Load the records of one split, `None` when it has no files
pub async fn load_split<I: Record>(
    files: &[String],
    max_samples: Option<usize>,
) -> Result<Option<Vec<I>>, DatasetError> {
    if files.is_empty() {
        return Ok(None);
    }

    let corpus = Corpus::<I>::load(files, max_samples).await?;

    Ok(Some(corpus.items()))
}

/// Log the first encoded examples of a split at debug level
pub fn log_examples<F: Debug>(mode: Mode, features: &[F]) {
    log::info!("Encoded {} {} examples", features.len(), mode);

    for feature in features.iter().take(LOGGED_EXAMPLES) {
        log::debug!("{} example: {:?}", mode, feature);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::datasets::tnews;

    #[tokio::test]
    async fn test_unlabelled_test_split() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        std::fs::write(&path, "{\"id\": 0, \"sentence\": \"北京\"}\n").unwrap();
        let files = vec![path.to_str().unwrap().to_string()];

        let records = load_split::<tnews::Item>(&files, None).await.unwrap();
        assert!(!all_labelled(records.as_deref()));

        let labelled = [tnews::Item::new("北京".into(), Some("news_edu".into()))];
        assert!(all_labelled(Some(&labelled[..])));
        assert!(!all_labelled::<tnews::Item>(None));
    }

    #[test]
    fn test_hold_out() {
        let mut chunks = vec!["a", "b", "c", "d"];
        assert_eq!(hold_out(&mut chunks, 0.25), vec!["d"]);
        assert_eq!(chunks, vec!["a", "b", "c"]);

        let mut few = vec![1, 2];
        assert_eq!(hold_out(&mut few, 0.0), vec![2]);
        assert_eq!(few, vec![1]);

        let mut single = vec!["a"];
        assert!(hold_out(&mut single, 0.5).is_empty());
        assert_eq!(single.len(), 1);
    }
}
