use std::fmt::Display;

use super::models::{bert, Model};

/// TNEWS sentence classification
pub static TNEWS: &str = "tnews";

/// CLUENER with start/end span tagging
pub static CLUENER_SPAN: &str = "cluener-span";

/// CLUENER with a global pointer
pub static CLUENER_POINTER: &str = "cluener-pointer";

/// CLUENER with cascaded BIO and entity-type tagging
pub static CLUENER_CASCADE: &str = "cluener-cascade";

/// Relation extraction by token linking
pub static RELATION: &str = "relation";

/// Unsupervised SimCSE sentence embeddings
pub static SIMCSE: &str = "simcse";

/// Whole-word masked language model pretraining
pub static MLM: &str = "mlm";

/// Available Tasks
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Task {
    /// TNEWS sentence classification
    Tnews,

    /// CLUENER span NER
    ClueNerSpan,

    /// CLUENER global pointer NER
    ClueNerPointer,

    /// CLUENER cascade NER
    ClueNerCascade,

    /// Relation extraction
    Relation,

    /// SimCSE sentence embeddings
    SimCse,

    /// Masked language modelling
    Mlm,
}

impl Task {
    /// Every task, in help-text order
    pub const ALL: [Task; 7] = [
        Task::Tnews,
        Task::ClueNerSpan,
        Task::ClueNerPointer,
        Task::ClueNerCascade,
        Task::Relation,
        Task::SimCse,
        Task::Mlm,
    ];

    /// Get the unique string token that identifies this task
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Tnews => TNEWS,
            Task::ClueNerSpan => CLUENER_SPAN,
            Task::ClueNerPointer => CLUENER_POINTER,
            Task::ClueNerCascade => CLUENER_CASCADE,
            Task::Relation => RELATION,
            Task::SimCse => SIMCSE,
            Task::Mlm => MLM,
        }
    }

    /// Get the default model variant for the given task
    pub fn default_model(&self) -> Model {
        Model::Bert(bert::DEFAULT_MODEL.to_string())
    }

    /// Whether the task needs the BERT pooling layer
    pub fn uses_pooler(&self) -> bool {
        matches!(self, Task::Tnews | Task::SimCse)
    }
}

impl TryFrom<&str> for Task {
    type Error = TaskError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.to_lowercase();

        Task::ALL
            .into_iter()
            .find(|task| task.as_str() == value)
            .ok_or(TaskError::Unknown(value))
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task Error
#[derive(thiserror::Error, Debug)]
pub enum TaskError {
    /// No task found for the given string
    #[error("no task found for {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_round_trip_names() {
        for task in Task::ALL {
            assert_eq!(Task::try_from(task.to_string().as_str()).unwrap(), task);
        }

        assert_eq!(Task::try_from("CLUENER-Span").unwrap(), Task::ClueNerSpan);
        assert!(matches!(Task::try_from("snips"), Err(TaskError::Unknown(_))));
    }
}
