use super::ApiError;
use crate::catalog::{Section, SortKey};
use crate::domain::SortOrder;
use crate::models::{TitleFlag, VideoProvider};

pub const MAX_WINDOW_DAYS: u32 = 365;

pub fn validate_window_days(days: u32) -> Result<u32, ApiError> {
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(ApiError::validation_field(
            "days",
            format!("Invalid window: {days}. Days must be between 1 and {MAX_WINDOW_DAYS}"),
        ));
    }
    Ok(days)
}

pub fn validate_season_number(number: u32) -> Result<u32, ApiError> {
    if number == 0 {
        return Err(ApiError::validation_field(
            "season_number",
            "Season number must be a positive integer",
        ));
    }
    Ok(number)
}

pub fn validate_limit(limit: usize) -> Result<usize, ApiError> {
    const MAX_LIMIT: usize = 100;
    const MIN_LIMIT: usize = 1;

    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation_field(
            "limit",
            format!("Invalid limit: {limit}. Limit must be between {MIN_LIMIT} and {MAX_LIMIT}"),
        ));
    }
    Ok(limit)
}

/// Splits a comma separated id list, skipping blanks.
pub fn parse_id_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_flag(raw: &str) -> Result<TitleFlag, ApiError> {
    raw.parse().map_err(|e: String| ApiError::validation_field("flag", e))
}

pub fn parse_provider(raw: &str) -> Result<VideoProvider, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError::validation_field("source", e))
}

pub fn parse_providers(raw: Option<&str>) -> Result<Vec<VideoProvider>, ApiError> {
    parse_id_list(raw)
        .iter()
        .map(|p| parse_provider(p))
        .collect()
}

pub fn parse_section(raw: Option<&str>) -> Result<Section, ApiError> {
    raw.map_or(Ok(Section::All), |s| {
        s.parse()
            .map_err(|e: String| ApiError::validation_field("section", e))
    })
}

/// A sort key with an optional direction; a direction alone is rejected.
pub fn parse_sort(
    sort: Option<&str>,
    order: Option<&str>,
) -> Result<Option<(SortKey, SortOrder)>, ApiError> {
    let order = order
        .map(|o| {
            o.parse::<SortOrder>()
                .map_err(|e| ApiError::validation_field("order", e))
        })
        .transpose()?;

    match sort.map(str::trim).filter(|s| !s.is_empty()) {
        Some(key) => {
            let key = key
                .parse::<SortKey>()
                .map_err(|e| ApiError::validation_field("sort", e))?;
            Ok(Some((key, order.unwrap_or_default())))
        }
        None if order.is_some() => Err(ApiError::validation_field(
            "order",
            "A sort order needs a sort key",
        )),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_window_days() {
        assert!(validate_window_days(1).is_ok());
        assert!(validate_window_days(7).is_ok());
        assert!(validate_window_days(365).is_ok());
        assert!(validate_window_days(0).is_err());
        assert!(validate_window_days(366).is_err());
    }

    #[test]
    fn test_validate_season_number() {
        assert!(validate_season_number(1).is_ok());
        assert!(validate_season_number(0).is_err());
    }

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(100).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(101).is_err());
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list(Some("a, b,,c ")), vec!["a", "b", "c"]);
        assert!(parse_id_list(Some("")).is_empty());
        assert!(parse_id_list(None).is_empty());
    }

    #[test]
    fn test_parse_providers() {
        assert_eq!(
            parse_providers(Some("mega,stream_hg")).unwrap(),
            vec![VideoProvider::Mega, VideoProvider::StreamHg]
        );
        assert!(parse_providers(Some("youtube")).is_err());
    }

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort(None, None).unwrap(), None);
        assert_eq!(
            parse_sort(Some("rating"), Some("desc")).unwrap(),
            Some((SortKey::Rating, SortOrder::Desc))
        );
        assert_eq!(
            parse_sort(Some("name"), None).unwrap(),
            Some((SortKey::Title, SortOrder::Asc))
        );
        assert!(parse_sort(None, Some("desc")).is_err());
        assert!(parse_sort(Some("views"), None).is_err());
    }

    #[test]
    fn test_parse_section() {
        assert_eq!(parse_section(None).unwrap(), Section::All);
        assert_eq!(parse_section(Some("hindi_dub")).unwrap(), Section::HindiDub);
        assert!(parse_section(Some("anything")).is_err());
    }
}
