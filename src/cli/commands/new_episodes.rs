//! New episodes command handler

use crate::catalog::query;
use crate::config::Config;

pub async fn cmd_new_episodes(config: &Config, days: Option<u32>) -> anyhow::Result<()> {
    let days = days.unwrap_or(config.catalog.new_episode_window_days);
    if days == 0 {
        anyhow::bail!("The window must be at least one day");
    }

    let (state, snapshot) = super::load_catalog(config).await?;
    let recent = query::derive_new_episodes(&snapshot.titles, days, chrono::Utc::now());

    if recent.is_empty() {
        println!("No episodes released in the last {days} days.");
    } else {
        println!("New Episodes (last {days} days, {} total)", recent.len());
        println!("{:-<70}", "");
        for item in &recent {
            println!(
                "{} S{:02}E{:02} {}",
                item.title_name, item.season_number, item.episode.number, item.episode.title
            );
            println!(
                "  Released: {} | Title ID: {}",
                item.episode.release_date.format("%Y-%m-%d %H:%M"),
                item.title_id
            );
        }
    }

    state.shutdown().await;
    Ok(())
}
