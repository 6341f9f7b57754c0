/// First-run download of the all-MiniLM-L6-v2 ONNX export from HuggingFace.
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

const HF_BASE: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// Local file name and path relative to [`HF_BASE`].
const MODEL_FILES: &[(&str, &str)] = &[
    ("model.onnx", "onnx/model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
    ("config.json", "config.json"),
    ("special_tokens_map.json", "special_tokens_map.json"),
    ("tokenizer_config.json", "tokenizer_config.json"),
];

/// Names of any required files missing from `model_dir`.
#[must_use]
pub fn missing_files(model_dir: &Path) -> Vec<&'static str> {
    MODEL_FILES
        .iter()
        .filter(|(name, _)| !model_dir.join(name).exists())
        .map(|(name, _)| *name)
        .collect()
}

/// Download whichever model files are missing from `model_dir`.
///
/// Files are written to a `.part` path first and renamed once complete, so an
/// interrupted download is retried on the next start.
pub fn download_model_files(model_dir: &Path) -> Result<()> {
    fs::create_dir_all(model_dir)
        .with_context(|| format!("failed to create models directory: {}", model_dir.display()))?;

    let missing = missing_files(model_dir);
    if missing.is_empty() {
        info!("Model files present in {}", model_dir.display());
        return Ok(());
    }

    info!(
        "Downloading {} model file(s) to {} (one-time, ~90MB)",
        missing.len(),
        model_dir.display()
    );

    for &(filename, url_path) in MODEL_FILES {
        if !missing.contains(&filename) {
            continue;
        }
        let url = format!("{HF_BASE}/{url_path}");
        info!("Downloading {filename}");
        download_file(&model_dir.join(filename), &url)
            .with_context(|| format!("failed to download {filename}"))?;
    }

    info!("Model download complete");
    Ok(())
}

fn download_file(dest: &Path, url: &str) -> Result<()> {
    let mut resp =
        reqwest::blocking::get(url).with_context(|| format!("HTTP request failed: {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("bad status: {} for {url}", resp.status());
    }

    let pb = match resp.content_length() {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            pb
        }
        _ => ProgressBar::new_spinner(),
    };

    let part = dest.with_extension("part");
    let file = fs::File::create(&part)
        .with_context(|| format!("failed to create file: {}", part.display()))?;

    io::copy(&mut resp, &mut pb.wrap_write(file)).context("failed to write model file")?;
    pb.finish_and_clear();

    fs::rename(&part, dest)
        .with_context(|| format!("failed to move {} into place", part.display()))?;
    Ok(())
}
