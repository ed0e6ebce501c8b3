//! Command line tool to fine-tune a task

use anyhow::anyhow;
use burn::backend::{libtorch::LibTorchDevice, Autodiff, LibTorch};
use clue_transformers::{
    cli::Task,
    pipelines::{
        cascade_tagging, global_pointer, masked_lm, relation_extraction, sentence_embedding,
        span_ner, text_classification, Session, Training,
    },
};
use pico_args::Arguments;

type Backend = Autodiff<LibTorch>;

const HELP: &str = "\
Usage: train TASK [OPTIONS]

Arguments:
  TASK                  One of: tnews, cluener-span, cluener-pointer, cluener-cascade,
                        relation, simcse, mlm

Options:
  -h, --help            Print help
  -c, --config          A YAML file overriding the task defaults
  -m, --model           Hub model name or local model directory (e.g., 'bert-base-chinese')
  -o, --output-dir      Where artifacts are written, under <output-dir>/<task>
  -n, --num-epochs      Number of epochs to train for
  -b, --batch-size      Training batch size
  --max-steps           Stop after this many optimizer steps
  --learning-rate       Learning rate
  --max-seq-length      Maximum sequence length for every split
  --seed                Random seed
  --train-file          Training file (repeatable)
  --eval-file           Validation file (repeatable)
  --test-file           Test file (repeatable)
  --label-file          Label file (repeatable)
  --no-train            Skip fitting and evaluate the model saved in the artifact directory
  --no-eval             Skip evaluation on the validation split
  --do-test             Evaluate on the test split
  --cpu                 Run on the CPU instead of the first CUDA device
  --no-tui              Disable TUI
";

#[derive(Debug)]
struct Args {
    task: String,
    config: Option<String>,
    model: Option<String>,
    output_dir: Option<String>,
    num_epochs: Option<usize>,
    batch_size: Option<usize>,
    max_steps: Option<usize>,
    learning_rate: Option<f64>,
    max_seq_length: Option<usize>,
    seed: Option<u64>,
    train_file: Vec<String>,
    eval_file: Vec<String>,
    test_file: Vec<String>,
    label_file: Vec<String>,
    no_train: bool,
    no_eval: bool,
    do_test: bool,
    cpu: bool,
    use_tui: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let args = Args {
            config: pargs.opt_value_from_str(["-c", "--config"])?,
            model: pargs.opt_value_from_str(["-m", "--model"])?,
            output_dir: pargs.opt_value_from_str(["-o", "--output-dir"])?,
            num_epochs: pargs.opt_value_from_str(["-n", "--num-epochs"])?,
            batch_size: pargs.opt_value_from_str(["-b", "--batch-size"])?,
            max_steps: pargs.opt_value_from_str("--max-steps")?,
            learning_rate: pargs.opt_value_from_str("--learning-rate")?,
            max_seq_length: pargs.opt_value_from_str("--max-seq-length")?,
            seed: pargs.opt_value_from_str("--seed")?,
            train_file: pargs.values_from_str("--train-file")?,
            eval_file: pargs.values_from_str("--eval-file")?,
            test_file: pargs.values_from_str("--test-file")?,
            label_file: pargs.values_from_str("--label-file")?,
            no_train: pargs.contains("--no-train"),
            no_eval: pargs.contains("--no-eval"),
            do_test: pargs.contains("--do-test"),
            cpu: pargs.contains("--cpu"),
            use_tui: !(pargs.contains("--no-tui")),
            task: pargs.free_from_str().map_err(|e| match e {
                pico_args::Error::MissingArgument => anyhow!("Missing required argument: TASK"),
                _ => anyhow!("{}", e),
            })?,
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(anyhow!("Unexpected arguments: {:?}", remaining));
        }

        Ok(Some(args))
    }

    /// Task defaults, then the YAML file, then the command line
    async fn training(&self, task: Task) -> anyhow::Result<Training> {
        let mut config = match &self.config {
            Some(path) => Training::from_yaml(task, path).await?,
            None => Training::for_task(task),
        };

        if let Some(model) = &self.model {
            config.model_name_or_path.clone_from(model);
        }

        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }

        if let Some(num_epochs) = self.num_epochs {
            config.num_epochs = num_epochs;
        }

        if let Some(batch_size) = self.batch_size {
            config.train_batch_size = batch_size;
        }

        if self.max_steps.is_some() {
            config.max_steps = self.max_steps;
        }

        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }

        if let Some(max_seq_length) = self.max_seq_length {
            config.train_max_seq_length = max_seq_length;
            config.eval_max_seq_length = max_seq_length;
            config.test_max_seq_length = max_seq_length;
        }

        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        for (files, given) in [
            (&mut config.train_file, &self.train_file),
            (&mut config.eval_file, &self.eval_file),
            (&mut config.test_file, &self.test_file),
            (&mut config.label_file, &self.label_file),
        ] {
            if !given.is_empty() {
                files.clone_from(given);
            }
        }

        config.do_train &= !self.no_train;
        config.do_eval &= !self.no_eval;
        config.do_test |= self.do_test;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    let task = Task::try_from(args.task.as_str())?;
    let config = args.training(task).await?;

    let device = if args.cpu {
        LibTorchDevice::Cpu
    } else {
        LibTorchDevice::Cuda(0)
    };

    let session = Session::prepare(task, config, args.use_tui).await?;
    let devices = vec![device];

    match task {
        Task::Tnews => text_classification::training::train::<Backend>(devices, &session).await,
        Task::ClueNerSpan => span_ner::training::train::<Backend>(devices, &session).await,
        Task::ClueNerPointer => global_pointer::training::train::<Backend>(devices, &session).await,
        Task::ClueNerCascade => {
            cascade_tagging::training::train::<Backend>(devices, &session).await
        }
        Task::Relation => relation_extraction::training::train::<Backend>(devices, &session).await,
        Task::SimCse => sentence_embedding::training::train::<Backend>(devices, &session).await,
        Task::Mlm => masked_lm::training::train::<Backend>(devices, &session).await,
    }
}
