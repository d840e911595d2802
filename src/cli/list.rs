//! CLI `list`, `show`, and `brand` commands.

use anyhow::{bail, Result};

use capdex::catalog::{open_store, CatalogItem};
use capdex::config::CapdexConfig;

/// Print the whole catalog ordered by id.
pub fn list(config: &CapdexConfig) -> Result<()> {
    let store = open_store(config)?;
    let items = store.get_all()?;
    print_items(&items);
    Ok(())
}

/// Print a single cap by id.
pub fn show(config: &CapdexConfig, id: i64) -> Result<()> {
    let store = open_store(config)?;
    match store.get(id)? {
        Some(item) => print_items(std::slice::from_ref(&item)),
        None => bail!("no cap with id {id}"),
    }
    Ok(())
}

/// Print caps whose brand contains `text`, ignoring case.
pub fn brand(config: &CapdexConfig, text: &str) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        bail!("brand search text must not be empty");
    }

    let store = open_store(config)?;
    let items = store.find_by_brand_substring(text)?;
    print_items(&items);
    Ok(())
}

fn print_items(items: &[CatalogItem]) {
    if items.is_empty() {
        println!("No caps found.");
        return;
    }

    println!("{:>6}  {:<24} {:<12} {}", "ID", "BRAND", "TYPE", "IMAGE");
    for item in items {
        println!(
            "{:>6}  {:<24} {:<12} {}",
            item.id, item.brand, item.cap_type, item.image_ref
        );
    }
    println!("\n{} cap(s)", items.len());
}
