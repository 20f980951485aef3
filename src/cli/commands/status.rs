//! Catalog status command handler

use crate::catalog::{CatalogStatus, query};
use crate::config::Config;
use crate::state::SharedState;

pub async fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let mut config = config.clone();
    config.catalog.purge_sample_titles = false;

    let state = SharedState::new(config).await?;
    let snapshot = state.wait_until_loaded(super::LOAD_TIMEOUT).await;

    println!("anicatalog v{}", env!("CARGO_PKG_VERSION"));
    println!("{:-<50}", "");
    match &snapshot.status {
        CatalogStatus::Loading => println!("Status:   loading"),
        CatalogStatus::Ready => println!("Status:   ready"),
        CatalogStatus::Failed {
            collection,
            kind,
            message,
        } => {
            println!("Status:   failed ({collection})");
            println!("          {}", kind.user_message());
            println!("          {message}");
        }
    }
    println!("Titles:   {}", snapshot.titles.len());
    println!("Movies:   {}", snapshot.movies.len());
    println!(
        "Episodes: {}",
        snapshot
            .titles
            .iter()
            .map(query::total_episodes)
            .sum::<usize>()
    );
    for count in query::section_counts(&snapshot.titles) {
        println!("  {:?}: {}", count.section, count.count);
    }

    state.shutdown().await;
    Ok(())
}
