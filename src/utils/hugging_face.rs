use std::path::{Path, PathBuf};

use hf_hub::api::tokio;

/// The files of a pre-trained model
#[derive(Clone, Debug)]
pub struct ModelFiles {
    /// The Hugging Face `config.json`
    pub config: PathBuf,

    /// The `model.safetensors` weights
    pub weights: PathBuf,

    /// A `tokenizer.json`, if one is available
    pub tokenizer: Option<PathBuf>,

    /// A BERT `vocab.txt`, if one is available
    pub vocab: Option<PathBuf>,
}

/// Resolve a model either from a local directory or from the Hugging Face Hub
pub async fn resolve_model(name_or_path: &str) -> anyhow::Result<ModelFiles> {
    let dir = Path::new(name_or_path);

    if dir.is_dir() {
        log::info!("Using local model files from {}", dir.display());

        return local_model(dir);
    }

    download_hf_model(name_or_path).await
}

fn local_model(dir: &Path) -> anyhow::Result<ModelFiles> {
    let config = dir.join("config.json");
    let weights = dir.join("model.safetensors");

    if !config.is_file() {
        return Err(anyhow!("Missing config.json in {}", dir.display()));
    }

    if !weights.is_file() {
        return Err(anyhow!("Missing model.safetensors in {}", dir.display()));
    }

    let tokenizer = Some(dir.join("tokenizer.json")).filter(|p| p.is_file());
    let vocab = Some(dir.join("vocab.txt")).filter(|p| p.is_file());

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
        vocab,
    })
}

/// Download model config and weights from Hugging Face Hub
/// If file exists in cache, it will not be downloaded again
// NOTE: Modified from the built-in function to work within an already-async context
pub async fn download_hf_model(model_name: &str) -> anyhow::Result<ModelFiles> {
    let api = tokio::Api::new()?;
    let repo = api.model(model_name.to_string());

    log::info!("Fetching {} from the Hugging Face Hub", model_name);

    let weights = repo.get("model.safetensors").await.map_err(|e| {
        anyhow!(
            "Failed to download: {} weights with name: model.safetensors from HuggingFace Hub: {}",
            model_name,
            e
        )
    })?;

    let config = repo.get("config.json").await.map_err(|e| {
        anyhow!(
            "Failed to download: {} config with name: config.json from HuggingFace Hub: {}",
            model_name,
            e
        )
    })?;

    // Tokenizer files are optional, the tokenizer can fall back to the hub loader
    let tokenizer = repo.get("tokenizer.json").await.ok();
    let vocab = repo.get("vocab.txt").await.ok();

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
        vocab,
    })
}
