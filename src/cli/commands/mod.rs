mod list;
mod movies;
mod new_episodes;
mod recommend;
mod search;
mod status;

pub use list::cmd_list_titles;
pub use movies::cmd_list_movies;
pub use new_episodes::cmd_new_episodes;
pub use recommend::cmd_recommend;
pub use search::cmd_search_titles;
pub use status::cmd_status;

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{CatalogSnapshot, CatalogStatus};
use crate::config::Config;
use crate::models::Title;
use crate::state::SharedState;

const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens the store and waits for the first complete snapshot. Read-only
/// commands never purge sample titles.
async fn load_catalog(config: &Config) -> anyhow::Result<(SharedState, Arc<CatalogSnapshot>)> {
    let mut config = config.clone();
    config.catalog.purge_sample_titles = false;

    let state = SharedState::new(config).await?;
    let snapshot = state.wait_until_loaded(LOAD_TIMEOUT).await;

    match &snapshot.status {
        CatalogStatus::Ready => Ok((state, snapshot)),
        CatalogStatus::Loading => {
            state.shutdown().await;
            anyhow::bail!("Catalog did not load within {}s", LOAD_TIMEOUT.as_secs())
        }
        CatalogStatus::Failed {
            collection,
            kind,
            message,
        } => {
            state.shutdown().await;
            anyhow::bail!(
                "{} ({collection}: {message})",
                kind.user_message()
            )
        }
    }
}

fn print_title_line(title: &Title) {
    let markers: Vec<&str> = [
        (title.flags.trending, "trending"),
        (title.flags.is_hindi_dub, "hindi"),
        (title.flags.is_telugu_dub, "telugu"),
        (title.flags.is_new_episode, "new"),
    ]
    .into_iter()
    .filter_map(|(set, label)| set.then_some(label))
    .collect();

    println!(
        "{} [{:.1}] {}",
        title.name,
        title.rating,
        if title.category.is_empty() {
            "-"
        } else {
            title.category.as_str()
        }
    );
    print!("  ID: {} | Episodes: {}", title.id, title.total_episodes());
    if markers.is_empty() {
        println!();
    } else {
        println!(" | {}", markers.join(", "));
    }
}
