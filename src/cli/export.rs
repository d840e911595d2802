use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use capdex::catalog::open_store;
use capdex::config::CapdexConfig;

/// Export every cap as pretty JSON, in the same shape `import` reads.
///
/// Without `output` a timestamped file is written to `exports_dir`; `-` means stdout.
pub fn export(config: &CapdexConfig, output: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let items = store.get_all()?;
    let json = serde_json::to_string_pretty(&items)?;

    let dest = match output {
        Some(path) if path == Path::new("-") => {
            println!("{json}");
            eprintln!("Exported {} caps.", items.len());
            return Ok(());
        }
        Some(path) => path.to_path_buf(),
        None => {
            let dir = config.resolved_exports_dir();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create exports dir: {}", dir.display()))?;
            dir.join(export_file_name(chrono::Local::now()))
        }
    };

    std::fs::write(&dest, json)
        .with_context(|| format!("failed to write export: {}", dest.display()))?;
    println!("Exported {} caps to {}", items.len(), dest.display());
    Ok(())
}

fn export_file_name<Tz: chrono::TimeZone>(at: chrono::DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    PathBuf::from(format!("capcollection_{}.json", at.format("%Y%m%d_%H%M%S")))
}
