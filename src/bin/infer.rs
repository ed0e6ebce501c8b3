//! Command line tool to run a fine-tuned model on raw text

use anyhow::{anyhow, Result};
use burn::backend::{libtorch::LibTorchDevice, LibTorch};
use clue_transformers::{
    cli::Task,
    pipelines::{span_ner, text_classification, Training},
};
use pico_args::Arguments;

const HELP: &str = "\
Usage: infer TASK [OPTIONS] TEXT...

Arguments:
  TASK                  One of: tnews, cluener-span
  TEXT                  One or more texts to run the model on

Options:
  -h, --help            Print help
  -o, --output-dir      The output directory the model was trained into (defaults to 'output')
  --cpu                 Run on the CPU instead of the first CUDA device
";

#[derive(Debug)]
struct Args {
    /// Prints the usage menu
    help: bool,

    /// The task the model was trained for
    task: String,

    /// The training output directory
    output_dir: Option<String>,

    /// Run on the CPU
    cpu: bool,

    /// The texts to run the model on
    samples: Vec<String>,
}

fn parse_args() -> Result<Args, pico_args::Error> {
    let mut pargs = Arguments::from_env();

    let help = pargs.contains(["-h", "--help"]);
    let output_dir = pargs.opt_value_from_str(["-o", "--output-dir"])?;
    let cpu = pargs.contains("--cpu");

    let mut free = pargs.finish().into_iter().map(|arg| arg.to_string_lossy().to_string());
    let task = free.next().unwrap_or_default();

    Ok(Args {
        help,
        task,
        output_dir,
        cpu,
        samples: free.collect(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = parse_args()?;

    if args.help || args.task.is_empty() {
        println!("{}", HELP);
        return Ok(());
    }

    let task = Task::try_from(args.task.as_str())?;
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| Training::for_task(task).output_dir);
    let artifact_dir = format!("{}/{}", output_dir, task);

    let device = if args.cpu {
        LibTorchDevice::Cpu
    } else {
        LibTorchDevice::Cuda(0)
    };

    match task {
        Task::Tnews => {
            let predictions =
                text_classification::inference::infer::<LibTorch>(device, &artifact_dir, &args.samples)
                    .await?;

            for (i, (text, prediction)) in args.samples.iter().zip(predictions).enumerate() {
                println!(
                    "\n=== Item {i} ===\
                     \n- Text: {text}\
                     \n- Class: {}\
                     \n- Score: {:.4}\
                     \n================",
                    prediction.label, prediction.score
                );
            }
        }
        Task::ClueNerSpan => {
            let entities =
                span_ner::inference::infer::<LibTorch>(device, &artifact_dir, &args.samples).await?;

            for (i, (text, entities)) in args.samples.iter().zip(entities).enumerate() {
                println!("\n=== Item {i} ===\n- Text: {text}");

                let chars: Vec<char> = text.chars().collect();
                for entity in entities {
                    let surface: String = chars
                        .get(entity.start..=entity.end)
                        .map(|span| span.iter().collect())
                        .unwrap_or_default();

                    println!("- {}: {} [{}, {}]", entity.label, surface, entity.start, entity.end);
                }

                println!("================");
            }
        }
        other => return Err(anyhow!("Inference is not available for {}", other)),
    }

    Ok(())
}
