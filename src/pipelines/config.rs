use std::fmt::Display;

use burn::LearningRate;
use serde_json::Value;

use crate::{
    cli::{models::Model, Task},
    utils::files::read_file,
};

/// The split a feature is built for, each has its own maximum sequence length
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Mode {
    /// Training split
    Train,

    /// Validation split
    Eval,

    /// Test split
    Test,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Train => "train",
            Mode::Eval => "eval",
            Mode::Test => "test",
        };

        write!(f, "{}", name)
    }
}

/// Training arguments shared by every task
#[derive(burn::config::Config, Debug)]
pub struct Training {
    /// Hub model name or local directory (e.g., "bert-base-chinese")
    #[config(default = "\"bert-base-chinese\".to_string()")]
    pub model_name_or_path: String,

    /// Training files
    #[config(default = "Vec::new()")]
    pub train_file: Vec<String>,

    /// Validation files
    #[config(default = "Vec::new()")]
    pub eval_file: Vec<String>,

    /// Test files
    #[config(default = "Vec::new()")]
    pub test_file: Vec<String>,

    /// Label files
    #[config(default = "Vec::new()")]
    pub label_file: Vec<String>,

    /// Whether to fit the model
    #[config(default = true)]
    pub do_train: bool,

    /// Whether to evaluate on the validation split after fitting
    #[config(default = true)]
    pub do_eval: bool,

    /// Whether to evaluate on the test split after fitting
    #[config(default = false)]
    pub do_test: bool,

    /// Initial learning rate
    #[config(default = 5e-5)]
    pub learning_rate: LearningRate,

    /// Number of epochs
    #[config(default = 3)]
    pub num_epochs: usize,

    /// Stop after this many optimizer steps
    #[config(default = "None")]
    pub max_steps: Option<usize>,

    /// Training batch size
    #[config(default = 16)]
    pub train_batch_size: usize,

    /// Validation and test batch size
    #[config(default = 32)]
    pub eval_batch_size: usize,

    /// Adam epsilon
    #[config(default = 1e-8)]
    pub adam_epsilon: f32,

    /// Number of batches to accumulate gradients over
    #[config(default = 1)]
    pub gradient_accumulation_steps: usize,

    /// Gradient norm clipping threshold
    #[config(default = 1.0)]
    pub max_grad_norm: f32,

    /// Decoupled weight decay
    #[config(default = 0.0)]
    pub weight_decay: f32,

    /// Root directory for artifacts, each task writes into its own subdirectory
    #[config(default = "\"output\".to_string()")]
    pub output_dir: String,

    /// Maximum sequence length for training features
    #[config(default = 380)]
    pub train_max_seq_length: usize,

    /// Maximum sequence length for validation features
    #[config(default = 512)]
    pub eval_max_seq_length: usize,

    /// Maximum sequence length for test features
    #[config(default = 512)]
    pub test_max_seq_length: usize,

    /// Lower-case characters before vocabulary lookup
    #[config(default = true)]
    pub do_lower_case: bool,

    /// Seed for shuffling and masking
    #[config(default = 42)]
    pub seed: u64,

    /// Data loader worker threads
    #[config(default = 4)]
    pub num_workers: usize,

    /// Keep at most this many records per split
    #[config(default = "None")]
    pub max_samples: Option<usize>,

    /// Span NER: independent start/end probabilities per label
    #[config(default = false)]
    pub with_multilabel: bool,

    /// Decision threshold on probabilities
    #[config(default = 0.5)]
    pub threshold: f32,

    /// Span NER: maximum number of ends paired with one start
    #[config(default = 1)]
    pub top_n: usize,

    /// Global pointer: query/key size
    #[config(default = 64)]
    pub head_size: usize,

    /// SimCSE: embedding size
    #[config(default = 512)]
    pub projection_size: usize,

    /// SimCSE: softmax temperature
    #[config(default = 0.05)]
    pub temperature: f64,

    /// MLM: mask whole words instead of single word pieces
    #[config(default = true)]
    pub do_whole_word_mask: bool,

    /// MLM: cap on masked positions per sequence
    #[config(default = 20)]
    pub max_predictions_per_seq: usize,

    /// MLM: share of tokens to mask
    #[config(default = 0.15)]
    pub masked_lm_prob: f64,

    /// MLM: masked copies generated for every chunk
    #[config(default = 5)]
    pub dupe_factor: usize,

    /// MLM: share of training chunks held out when no validation file is given
    #[config(default = 0.05)]
    pub eval_split: f64,
}

impl Training {
    /// The defaults for a task
    pub fn for_task(task: Task) -> Self {
        let config =
            Training::new().with_model_name_or_path(task.default_model().name_or_path().to_string());

        match task {
            Task::Tnews => config
                .with_train_batch_size(10)
                .with_eval_batch_size(2),
            Task::ClueNerSpan | Task::ClueNerCascade => config
                .with_num_epochs(15)
                .with_train_batch_size(64)
                .with_eval_batch_size(2),
            // Full fine-tuning, so the prefix-tuning rate and epoch count do not carry over
            Task::ClueNerPointer => config
                .with_num_epochs(15)
                .with_train_batch_size(140)
                .with_eval_batch_size(2)
                .with_train_max_seq_length(160)
                .with_eval_max_seq_length(160)
                .with_test_max_seq_length(160),
            Task::Relation => config
                .with_num_epochs(10)
                .with_train_batch_size(16)
                .with_eval_batch_size(8)
                .with_train_max_seq_length(320)
                .with_eval_max_seq_length(320)
                .with_test_max_seq_length(320),
            Task::SimCse => config
                .with_max_steps(Some(100_000))
                .with_train_batch_size(10)
                .with_eval_batch_size(2)
                .with_train_max_seq_length(512),
            Task::Mlm => config
                .with_train_batch_size(10)
                .with_eval_batch_size(2)
                .with_train_max_seq_length(512)
                .with_do_lower_case(false),
        }
    }

    /// Task defaults overlaid with the keys of a YAML file. Unknown keys are an error.
    pub async fn from_yaml(task: Task, path: &str) -> Result<Self, ConfigError> {
        let content = read_file(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_string(),
                source,
            })?
            .join("\n");

        Self::from_yaml_str(task, &content).map_err(|e| match e {
            ConfigError::Yaml { source, .. } => ConfigError::Yaml {
                path: path.to_string(),
                source,
            },
            other => other,
        })
    }

    /// Task defaults overlaid with the keys of a YAML document
    pub fn from_yaml_str(task: Task, content: &str) -> Result<Self, ConfigError> {
        let yaml_error = |source| ConfigError::Yaml {
            path: String::new(),
            source,
        };

        let document = serde_yaml::from_str::<serde_yaml::Value>(content).map_err(yaml_error)?;

        let overrides: serde_yaml::Mapping = match document {
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            value => serde_yaml::from_value(value).map_err(yaml_error)?,
        };

        let mut merged = serde_json::to_value(Self::for_task(task))?;

        if let Value::Object(fields) = &mut merged {
            for (key, value) in overrides {
                let key = key
                    .as_str()
                    .ok_or_else(|| ConfigError::Invalid("config keys must be strings".into()))?
                    .to_string();

                if !fields.contains_key(&key) {
                    return Err(ConfigError::Invalid(format!("unknown config key {}", key)));
                }

                fields.insert(key, serde_json::to_value(value)?);
            }
        }

        Ok(serde_json::from_value(merged)?)
    }

    /// The maximum sequence length for a split
    pub fn max_seq_length(&self, mode: Mode) -> usize {
        match mode {
            Mode::Train => self.train_max_seq_length,
            Mode::Eval => self.eval_max_seq_length,
            Mode::Test => self.test_max_seq_length,
        }
    }

    /// The input files for a split
    pub(crate) fn files(&self, mode: Mode) -> &[String] {
        match mode {
            Mode::Train => &self.train_file,
            Mode::Eval => &self.eval_file,
            Mode::Test => &self.test_file,
        }
    }

    /// The threshold as a logit, for heads that are compared before the sigmoid
    pub fn logit_threshold(&self) -> f32 {
        (self.threshold / (1.0 - self.threshold)).ln()
    }

    /// Reject settings that cannot produce valid features or batches
    pub fn validate(&self) -> Result<(), ConfigError> {
        Model::try_from(self.model_name_or_path.as_str())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for mode in [Mode::Train, Mode::Eval, Mode::Test] {
            if self.max_seq_length(mode) < 3 {
                return Err(ConfigError::Invalid(format!(
                    "{} max sequence length must be at least 3, got {}",
                    mode,
                    self.max_seq_length(mode)
                )));
            }
        }

        let counts = [
            ("train_batch_size", self.train_batch_size),
            ("eval_batch_size", self.eval_batch_size),
            ("num_epochs", self.num_epochs),
            ("gradient_accumulation_steps", self.gradient_accumulation_steps),
            ("dupe_factor", self.dupe_factor),
            ("top_n", self.top_n),
            ("head_size", self.head_size),
            ("projection_size", self.projection_size),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }

        if self.max_steps == Some(0) {
            return Err(ConfigError::Invalid("max_steps must be positive".into()));
        }

        let probabilities = [
            ("masked_lm_prob", self.masked_lm_prob),
            ("eval_split", self.eval_split),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "threshold must be within (0, 1), got {}",
                self.threshold
            )));
        }

        if self.temperature <= 0.0 {
            return Err(ConfigError::Invalid("temperature must be positive".into()));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("unable to read config file {path}: {source}")]
    Io {
        /// The config file
        path: String,
        /// The underlying error
        source: std::io::Error,
    },

    /// The config file is not valid YAML
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        /// The config file
        path: String,
        /// The underlying error
        source: serde_yaml::Error,
    },

    /// A value has the wrong type
    #[error("invalid config value: {0}")]
    Value(#[from] serde_json::Error),

    /// A setting outside of its valid range
    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_task_defaults() {
        let config = Training::for_task(Task::ClueNerPointer);

        assert_eq!(config.train_batch_size, 140);
        assert_eq!(config.max_seq_length(Mode::Eval), 160);
        assert_eq!(config.learning_rate, 5e-5);
        assert!(config.logit_threshold().abs() < 1e-6);
        assert!(config.validate().is_ok());

        let tnews = Training::for_task(Task::Tnews);
        assert_eq!(tnews.train_max_seq_length, 380);
        assert_eq!(tnews.max_seq_length(Mode::Test), 512);
    }

    #[test]
    fn test_defaults_for_every_task() {
        // (task, epochs, max steps, train batch, eval batch, train/eval/test length, lower case)
        let expected = [
            (Task::Tnews, 3, None, 10, 2, [380, 512, 512], true),
            (Task::ClueNerSpan, 15, None, 64, 2, [380, 512, 512], true),
            (Task::ClueNerCascade, 15, None, 64, 2, [380, 512, 512], true),
            (Task::ClueNerPointer, 15, None, 140, 2, [160, 160, 160], true),
            (Task::Relation, 10, None, 16, 8, [320, 320, 320], true),
            (Task::SimCse, 3, Some(100_000), 10, 2, [512, 512, 512], true),
            (Task::Mlm, 3, None, 10, 2, [512, 512, 512], false),
        ];

        for (task, epochs, max_steps, train_bs, eval_bs, lengths, lower) in expected {
            let config = Training::for_task(task);

            assert_eq!(config.model_name_or_path, "bert-base-chinese", "{}", task);
            assert_eq!(config.learning_rate, 5e-5, "{}", task);
            assert_eq!(config.num_epochs, epochs, "{}", task);
            assert_eq!(config.max_steps, max_steps, "{}", task);
            assert_eq!(config.train_batch_size, train_bs, "{}", task);
            assert_eq!(config.eval_batch_size, eval_bs, "{}", task);
            assert_eq!(
                [
                    config.max_seq_length(Mode::Train),
                    config.max_seq_length(Mode::Eval),
                    config.max_seq_length(Mode::Test)
                ],
                lengths,
                "{}",
                task
            );
            assert_eq!(config.do_lower_case, lower, "{}", task);
            assert_eq!(config.adam_epsilon, 1e-8);
            assert_eq!(config.gradient_accumulation_steps, 1);
            assert_eq!(config.max_grad_norm, 1.0);
            assert_eq!(config.weight_decay, 0.0);
            assert!(config.validate().is_ok(), "{}", task);
        }

        let mlm = Training::for_task(Task::Mlm);
        assert!(mlm.do_whole_word_mask);
        assert_eq!(mlm.max_predictions_per_seq, 20);
        assert_eq!(mlm.dupe_factor, 5);
        assert_eq!(mlm.masked_lm_prob, 0.15);
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = "train_file: [data/train.json]\nnum_epochs: 2\nwith_multilabel: true\n";
        let config = Training::from_yaml_str(Task::ClueNerSpan, yaml).unwrap();

        assert_eq!(config.train_file, vec!["data/train.json".to_string()]);
        assert_eq!(config.num_epochs, 2);
        assert!(config.with_multilabel);
        assert_eq!(config.train_batch_size, 64);
    }

    #[test]
    fn test_empty_yaml_keeps_defaults() {
        let config = Training::from_yaml_str(Task::Mlm, "").unwrap();

        assert_eq!(config.dupe_factor, 5);
        assert!(!config.do_lower_case);
    }

    #[test]
    fn test_unknown_yaml_key() {
        let err = Training::from_yaml_str(Task::Tnews, "lr: 0.1\n").unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("lr")));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let short = Training::for_task(Task::Tnews).with_eval_max_seq_length(2);
        assert!(short.validate().is_err());

        let no_batch = Training::for_task(Task::Tnews).with_train_batch_size(0);
        assert!(no_batch.validate().is_err());

        let bad_prob = Training::for_task(Task::Mlm).with_masked_lm_prob(1.5);
        assert!(bad_prob.validate().is_err());
    }

    #[test]
    fn test_model_rule_applies_to_yaml() {
        let hub = Training::from_yaml_str(Task::Tnews, "model_name_or_path: uer/roberta-tiny\n")
            .unwrap();
        assert!(hub.validate().is_ok());

        let bad = Training::from_yaml_str(Task::Tnews, "model_name_or_path: not a model\n")
            .unwrap();
        assert!(matches!(bad.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("not a model")));
    }
}
