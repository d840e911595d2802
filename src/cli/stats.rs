use anyhow::Result;

use capdex::catalog::open_store;
use capdex::config::CapdexConfig;

/// Display catalog statistics in the terminal.
pub fn stats(config: &CapdexConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let store = open_store(config)?;
    let stats = store.stats(config.embedding.dimensions)?;
    let stored_model = store.embedding_model()?;

    println!("Catalog Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total caps:          {}", stats.total);
    println!("  With embedding:      {}", stats.embedded);
    println!("  Without embedding:   {}", stats.missing_embedding);
    if stats.corrupt_embedding > 0 {
        println!("  Corrupt embeddings:  {}", stats.corrupt_embedding);
    }
    println!();

    println!("Database:              {}", db_path.display());
    println!("Schema version:        {}", store.schema_version()?);
    println!(
        "Embedding model:       {} (configured: {})",
        stored_model.as_deref().unwrap_or("none"),
        config.embedding.model
    );
    if let Some(stored) = stored_model.as_deref() {
        if stored != config.embedding.model {
            println!("\nWarning: stored embeddings were made with a different model; re-import to refresh them.");
        }
    }

    Ok(())
}
