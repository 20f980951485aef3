//! Search titles command handler

use crate::catalog::query;
use crate::config::Config;

pub async fn cmd_search_titles(config: &Config, query_text: &str) -> anyhow::Result<()> {
    let (state, snapshot) = super::load_catalog(config).await?;

    println!("Searching for: {query_text}");
    let results = query::search(query_text, &snapshot.titles);

    if results.is_empty() {
        println!("No titles found matching '{query_text}'");
    } else {
        println!("{:-<70}", "");
        for title in &results {
            super::print_title_line(title);
        }
    }

    state.shutdown().await;
    Ok(())
}
