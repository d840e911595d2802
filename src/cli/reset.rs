//! CLI `reset` command: delete all caps after user confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use capdex::catalog::open_store;
use capdex::config::CapdexConfig;

/// Delete all caps, prompting first unless `yes` is set.
pub fn reset(config: &CapdexConfig, yes: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let store = open_store(config)?;

    if !yes {
        println!(
            "WARNING: This will permanently delete ALL {} caps and their embeddings.",
            store.count()?
        );
        println!("Database: {}", db_path.display());
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "YES" {
            bail!("reset cancelled");
        }
    }

    let removed = store.reset()?;

    println!("Deleted {removed} caps. Catalog reset complete.");
    Ok(())
}
