// Fetch the sentence embedding model that ranks expansion candidates.
//
// Files land in <model_dir>/all-MiniLM-L6-v2/. Each is streamed into a
// `.part` sibling and renamed once complete, so an interrupted download never
// leaves a truncated file that would count as present.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Directory name of the embedding model under the model base directory.
pub const EMBEDDING_MODEL_NAME: &str = "all-MiniLM-L6-v2";

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

const HF_REPO: &str = "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

struct ModelFile {
    local: &'static str,
    remote: &'static str,
    /// Large files get a byte progress bar
    large: bool,
}

static FILES: [ModelFile; 2] = [
    ModelFile {
        local: TOKENIZER_FILE,
        remote: "tokenizer.json",
        large: false,
    },
    ModelFile {
        local: MODEL_FILE,
        remote: "onnx/model.onnx",
        large: true,
    },
];

/// Platform data directory, e.g. ~/.local/share/epitrace/models on Linux.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("epitrace")
        .join("models")
}

pub fn embedding_model_dir(base: &Path) -> PathBuf {
    base.join(EMBEDDING_MODEL_NAME)
}

/// Model files not yet downloaded under `base`, in download order.
pub fn missing_files(base: &Path) -> Vec<&'static str> {
    let dir = embedding_model_dir(base);
    FILES
        .iter()
        .filter(|f| !dir.join(f.local).is_file())
        .map(|f| f.local)
        .collect()
}

pub fn embedding_files_present(base: &Path) -> bool {
    missing_files(base).is_empty()
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Download whatever model files are missing. Returns how many were fetched.
pub async fn download_model(base: &Path) -> Result<usize> {
    let dir = embedding_model_dir(base);
    let missing = missing_files(base);
    if missing.is_empty() {
        info!(dir = %dir.display(), "Embedding model already present");
        return Ok(0);
    }

    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create model directory {}", dir.display()))?;

    let client = reqwest::Client::builder()
        .user_agent("epitrace/0.1")
        .build()
        .context("Failed to build HTTP client")?;

    let mut fetched = 0;
    for file in FILES.iter().filter(|f| missing.contains(&f.local)) {
        let url = format!("{HF_REPO}/{}", file.remote);
        let dest = dir.join(file.local);
        println!("  {}", file.local);
        let bytes = fetch_to(&client, &url, &dest, file.large).await?;
        info!(file = file.local, bytes = bytes, "Downloaded model file");
        fetched += 1;
    }
    Ok(fetched)
}

fn progress_bar(total: Option<u64>) -> Result<ProgressBar> {
    Ok(match total {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::default_spinner().template("    {spinner} {bytes}")?);
            pb
        }
    })
}

/// Stream `url` into `dest` by way of a `.part` file; returns bytes written.
async fn fetch_to(client: &reqwest::Client, url: &str, dest: &Path, progress: bool) -> Result<u64> {
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("Download of {} failed with status {}", url, response.status());
    }

    let pb = if progress {
        Some(progress_bar(response.content_length())?)
    } else {
        None
    };

    let part = part_path(dest);
    let mut out = tokio::fs::File::create(&part)
        .await
        .with_context(|| format!("Failed to create {}", part.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("Download of {url} interrupted"))?
    {
        out.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", part.display()))?;
        written += chunk.len() as u64;
        if let Some(pb) = &pb {
            pb.set_position(written);
        }
    }
    out.flush().await?;
    drop(out);

    tokio::fs::rename(&part, dest)
        .await
        .with_context(|| format!("Failed to move {} into place", dest.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    Ok(written)
}
