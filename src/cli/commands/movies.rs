//! Movies command handler

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::services::{DocumentMovieService, MovieService};
use crate::state::open_store;

/// Lists movies straight from the document store, without starting the
/// catalog subscriptions.
pub async fn cmd_list_movies(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let (events, _) = broadcast::channel(1);
    let service = DocumentMovieService::new(
        Arc::clone(&store),
        events,
        config.catalog.toggle_retry_limit,
    );

    let movies = service.list_movies().await?;
    if movies.is_empty() {
        println!("No movies in the catalog");
        return Ok(());
    }

    println!("{:-<70}", "");
    for movie in &movies {
        println!("{} ({})", movie.title, movie.release_date.format("%Y-%m-%d"));
        let genres = if movie.genres.is_empty() {
            "-".to_string()
        } else {
            movie.genres.join(", ")
        };
        println!("  ID: {} | Genres: {genres}", movie.id);
    }
    println!("{:-<70}", "");
    println!("Total: {} movies", movies.len());

    Ok(())
}
