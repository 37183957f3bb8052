//! Catalog command handlers.

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use glimpse::config::GlimpseConfig;
use glimpse::models::{CatalogItem, ItemId};
use glimpse::services::{ProductListing, ServiceContainer};

/// Catalog subcommands.
#[derive(Subcommand)]
pub enum CatalogAction {
    /// Add or update a catalog item.
    Add {
        /// Item identifier.
        #[arg(long)]
        id: String,

        /// Display name.
        #[arg(long)]
        name: String,

        /// Description.
        #[arg(long, default_value = "")]
        description: String,

        /// Price as a decimal string.
        #[arg(long, default_value = "")]
        price: String,

        /// Category name.
        #[arg(long, default_value = "")]
        category: String,

        /// Brand name.
        #[arg(long, default_value = "")]
        brand: String,

        /// Local image file used for extraction.
        #[arg(long)]
        image: Option<PathBuf>,

        /// Public image URL echoed in search results.
        #[arg(long)]
        image_url: Option<String>,

        /// Units in stock.
        #[arg(long, default_value = "0")]
        stock: u32,

        /// Mark the item inactive.
        #[arg(long)]
        inactive: bool,
    },

    /// List catalog items.
    List {
        /// Include inactive items.
        #[arg(long)]
        all: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "table")]
        format: ListFormat,
    },

    /// Remove a catalog item and its descriptor.
    Remove {
        /// Item identifier.
        id: String,
    },
}

/// Output format for `catalog list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// Aligned text columns.
    Table,
    /// JSON array.
    Json,
}

/// Catalog command.
pub fn cmd_catalog(
    config: &GlimpseConfig,
    action: CatalogAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = ServiceContainer::open(config)?;
    let catalog = services.catalog();

    match action {
        CatalogAction::Add {
            id,
            name,
            description,
            price,
            category,
            brand,
            image,
            image_url,
            stock,
            inactive,
        } => {
            let item = CatalogItem {
                id: ItemId::new(id),
                name,
                description,
                price,
                category,
                brand,
                image_path: image,
                image_url,
                stock,
                is_active: !inactive,
            };
            catalog.add_item(&item)?;
            println!("Stored item {}", item.id);
            if item.image_path.is_some() {
                println!("Run `glimpse index` to make it searchable.");
            }
        },
        CatalogAction::List { all, format } => {
            let listing = catalog.list_products(!all)?;
            match format {
                ListFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
                ListFormat::Table => print_table(&listing),
            }
        },
        CatalogAction::Remove { id } => {
            let id = ItemId::new(id);
            if catalog.remove_item(&id)? {
                println!("Removed item {id}");
            } else {
                println!("No item {id}");
            }
        },
    }
    Ok(())
}

fn print_table(listing: &[ProductListing]) {
    if listing.is_empty() {
        println!("No items.");
        return;
    }

    let id_width = listing
        .iter()
        .map(|l| l.item.id.as_str().len())
        .max()
        .unwrap_or(0)
        .max(2);
    let name_width = listing
        .iter()
        .map(|l| l.item.name.len())
        .max()
        .unwrap_or(0)
        .max(4);

    println!(
        "{:<id_width$}  {:<name_width$}  {:>10}  {:>6}  {:<6}  FEATURES",
        "ID", "NAME", "PRICE", "STOCK", "ACTIVE"
    );
    for entry in listing {
        let features = match entry.feature_space {
            Some(space) if entry.stale => format!("{space} (stale)"),
            Some(space) => space.to_string(),
            None => "-".to_string(),
        };
        println!(
            "{:<id_width$}  {:<name_width$}  {:>10}  {:>6}  {:<6}  {features}",
            entry.item.id.as_str(),
            entry.item.name,
            entry.item.price,
            entry.item.stock,
            if entry.item.is_active { "yes" } else { "no" },
        );
    }
}
