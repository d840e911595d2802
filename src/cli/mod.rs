pub mod export;
pub mod import;
pub mod list;
pub mod reset;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use capdex::config::{expand_tilde, EmbeddingConfig};
use capdex::embedding::local::model_path;

/// Download the ONNX feature extractor to `{cache_dir}/{model}.onnx`.
pub async fn model_download(config: &EmbeddingConfig, url: &str) -> Result<()> {
    let cache_dir = expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    let dest = model_path(&cache_dir, &config.model);
    if dest.exists() {
        println!("Model already exists at {}", dest.display());
        return Ok(());
    }

    println!("Downloading {} ...", config.model);
    download_file(url, &dest).await?;
    println!("Model saved to {}", dest.display());
    Ok(())
}

/// Download a file from a URL with progress bar. Uses atomic write (tmp + rename).
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => ProgressBar::new(size).with_style(bar_style(
            "  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})",
        )?),
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

fn bar_style(template: &str) -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template(template)
        .context("invalid progress template")?
        .progress_chars("##-"))
}
