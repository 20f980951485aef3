//! Recommendation command handler

use crate::catalog::{WatchHistory, query};
use crate::config::Config;
use crate::domain::TitleId;

pub async fn cmd_recommend(config: &Config, id: &str, history: &[String]) -> anyhow::Result<()> {
    let (state, snapshot) = super::load_catalog(config).await?;

    let Some(anchor) = snapshot.title(&TitleId::new(id)) else {
        state.shutdown().await;
        println!("Title not found: {id}");
        println!("Use 'anicatalog list' to see title IDs.");
        return Ok(());
    };

    let settings = &config.catalog;
    let history = WatchHistory::from_ids(
        history.iter().map(|h| TitleId::new(h.trim())),
        settings.watch_history_capacity,
    );
    let ranked = query::recommend(
        anchor,
        &snapshot.titles,
        &history,
        settings.recommendation_limit,
        settings.strong_match_threshold,
    );

    println!("Because you watched {}:", anchor.name);
    println!("{:-<70}", "");
    if ranked.is_empty() {
        println!("Nothing else in the catalog yet.");
    }
    for rec in &ranked {
        let strong = if rec.strong_match { " *" } else { "" };
        println!("[{}]{} {} ({})", rec.score, strong, rec.title.name, rec.title.id);
    }
    if ranked.iter().any(|r| r.strong_match) {
        println!();
        println!("* strong match");
    }

    state.shutdown().await;
    Ok(())
}
