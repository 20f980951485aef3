//! Pure query functions over a catalog snapshot.
//!
//! Nothing here touches the store or reads the clock; callers pass `now`
//! where time matters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use super::history::WatchHistory;
use crate::domain::{EpisodeId, SeasonId, SortOrder, TitleId};
use crate::models::{Episode, Season, Title};

/// Sentinel category meaning "no category filter".
pub const ALL_CATEGORIES: &str = "All Categories";

/// Ratings closer than this earn the rating bonus.
const RATING_WINDOW: f64 = 1.0;

/// Episode totals closer than this earn the length bonus.
const EPISODE_WINDOW: usize = 5;

/// Curated listing views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    #[default]
    All,
    Popular,
    #[serde(alias = "hindiDub")]
    HindiDub,
    #[serde(alias = "teluguDub")]
    TeluguDub,
    #[serde(alias = "newAnime")]
    NewAnime,
    Movies,
}

impl Section {
    pub const ALL: [Self; 6] = [
        Self::All,
        Self::Popular,
        Self::HindiDub,
        Self::TeluguDub,
        Self::NewAnime,
        Self::Movies,
    ];

    #[must_use]
    pub const fn matches(self, title: &Title) -> bool {
        let flags = &title.flags;
        match self {
            Self::All => true,
            Self::Popular => flags.trending,
            Self::HindiDub => flags.is_hindi_dub,
            Self::TeluguDub => flags.is_telugu_dub,
            Self::NewAnime => flags.is_new_episode,
            Self::Movies => flags.is_movie,
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "" | "all" => Ok(Self::All),
            "popular" | "trending" => Ok(Self::Popular),
            "hindidub" | "hindi" => Ok(Self::HindiDub),
            "telugudub" | "telugu" => Ok(Self::TeluguDub),
            "newanime" | "new" => Ok(Self::NewAnime),
            "movies" | "movie" => Ok(Self::Movies),
            _ => Err(format!("unknown section '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[serde(alias = "name")]
    Title,
    Category,
    Rating,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" | "name" => Ok(Self::Title),
            "category" => Ok(Self::Category),
            "rating" => Ok(Self::Rating),
            _ => Err(format!("unknown sort key '{s}'")),
        }
    }
}

/// Case-insensitive substring search over name, synopsis and category.
/// A blank query matches nothing; otherwise the query is matched as given,
/// surrounding whitespace included.
#[must_use]
pub fn search(query: &str, titles: &[Title]) -> Vec<Title> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();

    titles
        .iter()
        .filter(|t| {
            t.name.to_lowercase().contains(&needle)
                || t.synopsis.to_lowercase().contains(&needle)
                || t.category.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

#[must_use]
pub fn filter_by_section(section: Section, titles: &[Title]) -> Vec<Title> {
    titles
        .iter()
        .filter(|t| section.matches(t))
        .cloned()
        .collect()
}

/// Exact, case-sensitive category match. Empty or [`ALL_CATEGORIES`] keeps
/// everything.
#[must_use]
pub fn filter_by_category(category: &str, titles: &[Title]) -> Vec<Title> {
    if is_all_categories(category) {
        return titles.to_vec();
    }
    titles
        .iter()
        .filter(|t| t.category == category)
        .cloned()
        .collect()
}

#[must_use]
pub fn is_all_categories(category: &str) -> bool {
    category.is_empty() || category == ALL_CATEGORIES
}

/// Sorts in place. Ties are left in no particular order.
pub fn sort_titles(titles: &mut [Title], key: SortKey, order: SortOrder) {
    titles.sort_unstable_by(|a, b| {
        let ordering = match key {
            SortKey::Rating => a.rating.total_cmp(&b.rating),
            SortKey::Title => cmp_case_insensitive(&a.name, &b.name),
            SortKey::Category => cmp_case_insensitive(&a.category, &b.category),
        };
        if order.is_ascending() {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

fn cmp_case_insensitive(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Listing parameters as the home page and admin panel combine them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TitleQuery {
    pub search: Option<String>,
    pub section: Section,
    pub category: Option<String>,
    pub sort: Option<(SortKey, SortOrder)>,
}

impl TitleQuery {
    /// Search first (when given), then section, then category, then sort.
    #[must_use]
    pub fn apply(&self, titles: &[Title]) -> Vec<Title> {
        let mut results = match self.search.as_deref() {
            Some(query) => search(query, titles),
            None => titles.to_vec(),
        };

        if self.section != Section::All {
            results.retain(|t| self.section.matches(t));
        }
        if let Some(category) = self.category.as_deref()
            && !is_all_categories(category)
        {
            results.retain(|t| t.category == category);
        }
        if let Some((key, order)) = self.sort {
            sort_titles(&mut results, key, order);
        }
        results
    }
}

#[must_use]
pub fn trending(titles: &[Title]) -> Vec<Title> {
    titles
        .iter()
        .filter(|t| t.flags.trending)
        .cloned()
        .collect()
}

#[must_use]
pub fn season_trending(titles: &[Title]) -> Vec<Title> {
    titles
        .iter()
        .filter(|t| t.flags.season_trending)
        .cloned()
        .collect()
}

/// Distinct non-empty category labels, sorted.
#[must_use]
pub fn categories(titles: &[Title]) -> Vec<String> {
    titles
        .iter()
        .map(|t| t.category.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionCount {
    pub section: Section,
    pub count: usize,
}

#[must_use]
pub fn section_counts(titles: &[Title]) -> Vec<SectionCount> {
    Section::ALL
        .into_iter()
        .map(|section| SectionCount {
            section,
            count: titles.iter().filter(|t| section.matches(t)).count(),
        })
        .collect()
}

#[must_use]
pub fn total_episodes(title: &Title) -> usize {
    title.total_episodes()
}

/// An episode together with the title and season it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct RecentEpisode {
    pub title_id: TitleId,
    pub title_name: String,
    pub cover_image: String,
    pub season_id: SeasonId,
    pub season_number: u32,
    pub episode: Episode,
}

/// Episodes released within the last `window_days` days, newest first.
///
/// The window is `[now - window_days, now]`, inclusive at both ends.
/// Independent of the manually toggled `is_new_episode` title flag.
#[must_use]
pub fn derive_new_episodes(
    titles: &[Title],
    window_days: u32,
    now: DateTime<Utc>,
) -> Vec<RecentEpisode> {
    let cutoff = now - Duration::days(i64::from(window_days));

    let mut recent: Vec<RecentEpisode> = titles
        .iter()
        .flat_map(|title| {
            title.seasons.iter().flat_map(move |season| {
                season.episodes.iter().map(move |episode| (title, season, episode))
            })
        })
        .filter(|(_, _, episode)| episode.release_date >= cutoff && episode.release_date <= now)
        .map(|(title, season, episode)| RecentEpisode {
            title_id: title.id.clone(),
            title_name: title.name.clone(),
            cover_image: title.cover_image.clone(),
            season_id: season.id.clone(),
            season_number: season.number,
            episode: episode.clone(),
        })
        .collect();

    recent.sort_by(|a, b| b.episode.release_date.cmp(&a.episode.release_date));
    recent
}

/// Content-based similarity of `candidate` to `anchor`.
#[must_use]
pub fn recommendation_score(candidate: &Title, anchor: &Title, history: &WatchHistory) -> u32 {
    let mut score = 0;
    if candidate.category == anchor.category {
        score += 3;
    }
    if (candidate.rating - anchor.rating).abs() <= RATING_WINDOW {
        score += 2;
    }
    if history.contains(&candidate.id) {
        score += 1;
    }
    if total_episodes(candidate).abs_diff(total_episodes(anchor)) <= EPISODE_WINDOW {
        score += 1;
    }
    score
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub title: Title,
    pub score: u32,
    pub strong_match: bool,
}

/// Ranks every other title against `anchor`, best first, keeping `limit`.
#[must_use]
pub fn recommend(
    anchor: &Title,
    titles: &[Title],
    history: &WatchHistory,
    limit: usize,
    strong_match_threshold: u32,
) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = titles
        .iter()
        .filter(|t| t.id != anchor.id)
        .map(|candidate| {
            let score = recommendation_score(candidate, anchor, history);
            Recommendation {
                title: candidate.clone(),
                score,
                strong_match: score >= strong_match_threshold,
            }
        })
        .collect();

    ranked.sort_unstable_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(limit);
    ranked
}

/// Position of an episode for previous / next navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeRef {
    pub season_id: SeasonId,
    pub season_number: u32,
    pub episode_id: EpisodeId,
    pub episode_number: u32,
}

#[must_use]
pub fn find_episode(
    title: &Title,
    season_number: u32,
    episode_number: u32,
) -> Option<(&Season, &Episode)> {
    let season = title.season_by_number(season_number)?;
    let episode = season.episodes.iter().find(|e| e.number == episode_number)?;
    Some((season, episode))
}

/// Previous and next episode of `episode_id`, crossing season boundaries.
#[must_use]
pub fn episode_neighbours(
    title: &Title,
    episode_id: &EpisodeId,
) -> (Option<EpisodeRef>, Option<EpisodeRef>) {
    let mut ordered: Vec<EpisodeRef> = title
        .seasons
        .iter()
        .flat_map(|season| {
            season.episodes.iter().map(move |episode| EpisodeRef {
                season_id: season.id.clone(),
                season_number: season.number,
                episode_id: episode.id.clone(),
                episode_number: episode.number,
            })
        })
        .collect();
    ordered.sort_by_key(|r| (r.season_number, r.episode_number));

    let Some(index) = ordered.iter().position(|r| &r.episode_id == episode_id) else {
        return (None, None);
    };

    let previous = index.checked_sub(1).and_then(|i| ordered.get(i)).cloned();
    let next = ordered.get(index + 1).cloned();
    (previous, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EpisodeSources, TitleFlags};

    fn title(id: &str, name: &str, category: &str, rating: f64) -> Title {
        let now = Utc::now();
        Title {
            id: TitleId::new(id),
            name: name.to_string(),
            synopsis: String::new(),
            cover_image: String::new(),
            category: category.to_string(),
            flags: TitleFlags::default(),
            rating,
            seasons: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn episode(id: &str, number: u32, released: DateTime<Utc>) -> Episode {
        Episode {
            id: EpisodeId::new(id),
            title: format!("Episode {number}"),
            number,
            sources: EpisodeSources {
                stream_hg: Some("x".to_string()),
                ..Default::default()
            },
            thumbnail: String::new(),
            duration: "24m".to_string(),
            release_date: released,
            is_new: true,
        }
    }

    fn with_episodes(mut t: Title, season_number: u32, count: u32) -> Title {
        let released = Utc::now();
        t.seasons.push(Season {
            id: SeasonId::new(format!("{}-s{season_number}", t.id)),
            number: season_number,
            episodes: (1..=count)
                .map(|n| episode(&format!("{}-s{season_number}e{n}", t.id), n, released))
                .collect(),
        });
        t
    }

    fn ids(titles: &[Title]) -> Vec<&str> {
        titles.iter().map(|t| t.id.as_str()).collect()
    }

    fn sample() -> Vec<Title> {
        let mut one_piece = title("op", "One Piece", "Adventure", 9.0);
        one_piece.synopsis = "Pirates search for treasure".to_string();
        one_piece.flags.trending = true;
        one_piece.flags.is_hindi_dub = true;

        let mut naruto = title("na", "Naruto", "Action", 8.0);
        naruto.flags.is_telugu_dub = true;
        naruto.flags.season_trending = true;

        let mut your_name = title("yn", "Your Name", "Romance", 8.4);
        your_name.flags.is_movie = true;

        let mut frieren = title("fr", "Frieren", "Fantasy", 9.3);
        frieren.flags.is_new_episode = true;
        frieren.flags.trending = true;

        vec![one_piece, naruto, your_name, frieren]
    }

    #[test]
    fn search_matches_name_synopsis_and_category() {
        let titles = sample();
        assert_eq!(ids(&search("naru", &titles)), ["na"]);
        assert_eq!(ids(&search("TREASURE", &titles)), ["op"]);
        assert_eq!(ids(&search("romance", &titles)), ["yn"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let titles = sample();
        for query in ["FrIeReN", "frieren", "FRIEREN"] {
            assert_eq!(
                ids(&search(query, &titles)),
                ids(&search(&query.to_lowercase(), &titles))
            );
        }
    }

    #[test]
    fn empty_search_returns_nothing() {
        let titles = sample();
        assert!(search("", &titles).is_empty());
        assert!(search("   ", &titles).is_empty());
    }

    #[test]
    fn search_keeps_surrounding_whitespace() {
        let titles = vec![
            title("a", "Naruto", "Action", 8.0),
            title("b", "Naruto Shippuden", "Action", 8.5),
        ];
        assert_eq!(ids(&search("Naruto ", &titles)), ["b"]);
        assert_eq!(ids(&search("naruto", &titles)), ["a", "b"]);
    }

    #[test]
    fn section_all_is_identity() {
        let titles = sample();
        assert_eq!(filter_by_section(Section::All, &titles), titles);
    }

    #[test]
    fn sections_follow_flags() {
        let titles = sample();
        assert_eq!(ids(&filter_by_section(Section::Popular, &titles)), ["op", "fr"]);
        assert_eq!(ids(&filter_by_section(Section::HindiDub, &titles)), ["op"]);
        assert_eq!(ids(&filter_by_section(Section::TeluguDub, &titles)), ["na"]);
        assert_eq!(ids(&filter_by_section(Section::NewAnime, &titles)), ["fr"]);
        assert_eq!(ids(&filter_by_section(Section::Movies, &titles)), ["yn"]);
    }

    #[test]
    fn category_filter_is_case_sensitive() {
        let titles = sample();
        assert_eq!(ids(&filter_by_category("Action", &titles)), ["na"]);
        assert!(filter_by_category("action", &titles).is_empty());
        assert_eq!(filter_by_category("", &titles).len(), 4);
        assert_eq!(filter_by_category(ALL_CATEGORIES, &titles).len(), 4);
    }

    #[test]
    fn rating_sort_reverses_without_ties() {
        let mut asc = sample();
        sort_titles(&mut asc, SortKey::Rating, SortOrder::Asc);
        let mut desc = sample();
        sort_titles(&mut desc, SortKey::Rating, SortOrder::Desc);

        let mut reversed = ids(&asc);
        reversed.reverse();
        assert_eq!(ids(&desc), reversed);
        assert_eq!(ids(&asc), ["na", "yn", "op", "fr"]);
    }

    #[test]
    fn name_sort_ignores_case() {
        let mut titles = vec![
            title("b", "bleach", "Action", 7.0),
            title("a", "Akira", "Action", 7.0),
            title("c", "Clannad", "Drama", 7.0),
        ];
        sort_titles(&mut titles, SortKey::Title, SortOrder::Asc);
        assert_eq!(ids(&titles), ["a", "b", "c"]);

        sort_titles(&mut titles, SortKey::Title, SortOrder::Desc);
        assert_eq!(ids(&titles), ["c", "b", "a"]);
    }

    #[test]
    fn category_sort_ignores_case() {
        let mut titles = vec![
            title("r", "Toradora", "romance", 7.5),
            title("a", "Akira", "Action", 8.0),
            title("d", "Clannad", "drama", 8.2),
        ];
        sort_titles(&mut titles, SortKey::Category, SortOrder::Asc);
        assert_eq!(ids(&titles), ["a", "d", "r"]);

        sort_titles(&mut titles, SortKey::Category, SortOrder::Desc);
        assert_eq!(ids(&titles), ["r", "d", "a"]);
    }

    #[test]
    fn query_combines_search_filters_and_sort() {
        let titles = sample();
        let query = TitleQuery {
            search: None,
            section: Section::Popular,
            category: None,
            sort: Some((SortKey::Rating, SortOrder::Desc)),
        };
        assert_eq!(ids(&query.apply(&titles)), ["fr", "op"]);

        let query = TitleQuery {
            search: Some("o".to_string()),
            category: Some("Adventure".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&query.apply(&titles)), ["op"]);
    }

    #[test]
    fn new_episode_window_is_inclusive() {
        let now = DateTime::parse_from_rfc3339("2026-03-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let boundary = now - Duration::days(7);

        let mut t = title("t", "Show", "Action", 7.0);
        t.seasons.push(Season {
            id: SeasonId::new("s1"),
            number: 1,
            episodes: vec![
                episode("edge", 1, boundary),
                episode("late", 2, boundary - Duration::seconds(1)),
                episode("today", 3, now),
                episode("mid", 4, now - Duration::days(3)),
                episode("future", 5, now + Duration::hours(1)),
            ],
        });

        let recent = derive_new_episodes(&[t], 7, now);
        let found: Vec<&str> = recent.iter().map(|r| r.episode.id.as_str()).collect();
        assert_eq!(found, ["today", "mid", "edge"]);
    }

    #[test]
    fn new_episodes_ignore_the_manual_flag() {
        let now = Utc::now();
        let mut flagged = with_episodes(title("f", "Flagged", "Action", 7.0), 1, 1);
        flagged.flags.is_new_episode = true;
        for season in &mut flagged.seasons {
            for ep in &mut season.episodes {
                ep.release_date = now - Duration::days(30);
            }
        }
        assert!(derive_new_episodes(&[flagged], 7, now).is_empty());
    }

    #[test]
    fn recommendation_score_example() {
        let anchor = with_episodes(title("a", "Anchor", "Action", 8.0), 1, 24);
        let candidate = with_episodes(title("c", "Candidate", "Action", 8.5), 1, 26);
        let mut history = WatchHistory::new(20);
        history.record(TitleId::new("c"));

        let score = recommendation_score(&candidate, &anchor, &history);
        assert_eq!(score, 7);

        let ranked = recommend(&anchor, &[anchor.clone(), candidate], &history, 12, 4);
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].strong_match);
    }

    #[test]
    fn rating_difference_of_exactly_one_counts() {
        let anchor = title("a", "A", "Action", 8.0);
        let candidate = title("c", "C", "Drama", 9.0);
        let history = WatchHistory::new(20);
        // rating +2, episode counts both zero +1
        assert_eq!(recommendation_score(&candidate, &anchor, &history), 3);
    }

    #[test]
    fn recommendations_exclude_anchor_and_truncate() {
        let anchor = title("anchor", "Anchor", "Action", 5.0);
        let mut titles = vec![anchor.clone()];
        for i in 0..20 {
            titles.push(title(&format!("t{i}"), "Other", "Drama", 0.0));
        }
        titles.push(title("best", "Best", "Action", 5.0));

        let ranked = recommend(&anchor, &titles, &WatchHistory::new(20), 12, 4);
        assert_eq!(ranked.len(), 12);
        assert_eq!(ranked[0].title.id.as_str(), "best");
        assert!(ranked.iter().all(|r| r.title.id != anchor.id));
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn categories_are_distinct_and_sorted() {
        let mut titles = sample();
        titles.push(title("x", "X", "Action", 1.0));
        titles.push(title("y", "Y", "", 1.0));
        assert_eq!(
            categories(&titles),
            ["Action", "Adventure", "Fantasy", "Romance"]
        );
    }

    #[test]
    fn neighbours_cross_season_boundaries() {
        let t = with_episodes(with_episodes(title("t", "T", "A", 1.0), 2, 2), 1, 2);

        let last_of_first = EpisodeId::new("t-s1e2");
        let (prev, next) = episode_neighbours(&t, &last_of_first);
        assert_eq!(prev.unwrap().episode_id.as_str(), "t-s1e1");
        let next = next.unwrap();
        assert_eq!(next.season_number, 2);
        assert_eq!(next.episode_number, 1);

        let (prev, next) = episode_neighbours(&t, &EpisodeId::new("t-s1e1"));
        assert!(prev.is_none());
        assert!(next.is_some());

        assert!(find_episode(&t, 2, 2).is_some());
        assert!(find_episode(&t, 3, 1).is_none());
    }

    #[test]
    fn section_names_parse() {
        assert_eq!("hindiDub".parse(), Ok(Section::HindiDub));
        assert_eq!("telugu_dub".parse(), Ok(Section::TeluguDub));
        assert_eq!("newAnime".parse(), Ok(Section::NewAnime));
        assert_eq!("".parse(), Ok(Section::All));
        assert!("bogus".parse::<Section>().is_err());
    }
}
