//! List titles command handler

use crate::catalog::{Section, SortKey, TitleQuery};
use crate::config::Config;
use crate::domain::SortOrder;

pub async fn cmd_list_titles(
    config: &Config,
    section: Option<&str>,
    category: Option<&str>,
    sort: Option<&str>,
    desc: bool,
) -> anyhow::Result<()> {
    let section = section
        .map(str::parse::<Section>)
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();
    let sort = sort
        .map(str::parse::<SortKey>)
        .transpose()
        .map_err(anyhow::Error::msg)?
        .map(|key| {
            let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
            (key, order)
        });

    let (state, snapshot) = super::load_catalog(config).await?;

    let query = TitleQuery {
        search: None,
        section,
        category: category.map(str::to_string),
        sort,
    };
    let titles = query.apply(&snapshot.titles);

    if titles.is_empty() {
        println!("No titles match.");
    } else {
        println!("Titles ({} total)", titles.len());
        println!("{:-<70}", "");
        for title in &titles {
            super::print_title_line(title);
        }
    }

    state.shutdown().await;
    Ok(())
}
