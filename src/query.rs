use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "en-US";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    Popularity,
    Rating,
    VoteCount,
    ReleaseDate,
    Revenue,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

/// One of the closed set of sort orders the discovery endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub field: SortField,
    pub direction: Direction,
}

impl Default for SortBy {
    fn default() -> Self {
        Self::desc(SortField::Popularity)
    }
}

impl SortBy {
    pub const fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: Direction::Asc,
        }
    }

    pub const fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: Direction::Desc,
        }
    }

    pub fn as_str(self) -> &'static str {
        use Direction::*;
        use SortField::*;
        match (self.field, self.direction) {
            (Popularity, Asc) => "popularity.asc",
            (Popularity, Desc) => "popularity.desc",
            (Rating, Asc) => "vote_average.asc",
            (Rating, Desc) => "vote_average.desc",
            (VoteCount, Asc) => "vote_count.asc",
            (VoteCount, Desc) => "vote_count.desc",
            (ReleaseDate, Asc) => "primary_release_date.asc",
            (ReleaseDate, Desc) => "primary_release_date.desc",
            (Revenue, Asc) => "revenue.asc",
            (Revenue, Desc) => "revenue.desc",
            (Title, Asc) => "original_title.asc",
            (Title, Desc) => "original_title.desc",
        }
    }

    /// Parses `"rating"`, `"rating.asc"`, `"popularity.desc"` and the like.
    /// A bare field name sorts descending.
    pub fn parse(input: &str) -> Option<Self> {
        let (field, dir) = match input.split_once('.') {
            Some((f, d)) => (f, Some(d)),
            None => (input, None),
        };
        let field = match field {
            "popularity" => SortField::Popularity,
            "rating" | "vote_average" => SortField::Rating,
            "votes" | "vote_count" => SortField::VoteCount,
            "date" | "release_date" | "primary_release_date" => SortField::ReleaseDate,
            "revenue" => SortField::Revenue,
            "title" | "original_title" => SortField::Title,
            _ => return None,
        };
        let direction = match dir {
            None | Some("desc") => Direction::Desc,
            Some("asc") => Direction::Asc,
            Some(_) => return None,
        };
        Some(Self { field, direction })
    }
}

/// Joins ids with `|`; upstream treats pipe-separated values as OR.
pub fn any_of(ids: &[u64]) -> String {
    join_ids(ids, "|")
}

/// Joins ids with `,`; upstream treats comma-separated values as AND.
pub fn all_of(ids: &[u64]) -> String {
    join_ids(ids, ",")
}

fn join_ids(ids: &[u64], sep: &str) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Request-shaping value object for the discovery endpoint. Constructed
/// fresh per request from current filter state; never persisted.
///
/// Multi-value include/exclude fields hold already-joined strings: the
/// caller picks pipe (OR) or comma (AND) semantics via [`any_of`] /
/// [`all_of`] and the builder passes the result through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoverFilters {
    pub sort_by: SortBy,
    pub include_adult: Option<bool>,
    pub include_video: Option<bool>,
    pub language: Option<String>,
    pub region: Option<String>,
    pub primary_release_year: Option<i32>,
    pub release_date_gte: Option<String>,
    pub release_date_lte: Option<String>,
    pub vote_average_gte: Option<f32>,
    pub vote_average_lte: Option<f32>,
    pub vote_count_gte: Option<u32>,
    pub vote_count_lte: Option<u32>,
    pub with_genres: Option<String>,
    pub without_genres: Option<String>,
    pub with_runtime_gte: Option<u32>,
    pub with_runtime_lte: Option<u32>,
    pub with_cast: Option<String>,
    pub with_crew: Option<String>,
    pub with_companies: Option<String>,
    pub without_companies: Option<String>,
    pub with_keywords: Option<String>,
    pub without_keywords: Option<String>,
    pub certification: Option<String>,
    pub certification_gte: Option<String>,
    pub certification_lte: Option<String>,
    pub certification_country: Option<String>,
    pub watch_region: Option<String>,
    pub with_watch_providers: Option<String>,
    pub without_watch_providers: Option<String>,
    pub with_watch_monetization_types: Option<String>,
}

impl DiscoverFilters {
    /// Flattens the filters into ordered key/value pairs ready for
    /// query-string encoding.
    ///
    /// Only set, non-empty fields are emitted. Two defaults apply when the
    /// caller left them unset: `language=en-US` and `include_adult=false`.
    /// Values are not range-checked here; the upstream API is the authority
    /// on rejecting implausible bounds.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> = Vec::new();
        pairs.push(("sort_by", self.sort_by.as_str().to_string()));
        let language = self
            .language
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE);
        pairs.push(("language", language.to_string()));
        pairs.push((
            "include_adult",
            self.include_adult.unwrap_or(false).to_string(),
        ));
        push_value(&mut pairs, "include_video", self.include_video);
        push_text(&mut pairs, "region", &self.region);
        push_value(&mut pairs, "primary_release_year", self.primary_release_year);
        push_text(&mut pairs, "primary_release_date.gte", &self.release_date_gte);
        push_text(&mut pairs, "primary_release_date.lte", &self.release_date_lte);
        push_value(&mut pairs, "vote_average.gte", self.vote_average_gte);
        push_value(&mut pairs, "vote_average.lte", self.vote_average_lte);
        push_value(&mut pairs, "vote_count.gte", self.vote_count_gte);
        push_value(&mut pairs, "vote_count.lte", self.vote_count_lte);
        push_text(&mut pairs, "with_genres", &self.with_genres);
        push_text(&mut pairs, "without_genres", &self.without_genres);
        push_value(&mut pairs, "with_runtime.gte", self.with_runtime_gte);
        push_value(&mut pairs, "with_runtime.lte", self.with_runtime_lte);
        push_text(&mut pairs, "with_cast", &self.with_cast);
        push_text(&mut pairs, "with_crew", &self.with_crew);
        push_text(&mut pairs, "with_companies", &self.with_companies);
        push_text(&mut pairs, "without_companies", &self.without_companies);
        push_text(&mut pairs, "with_keywords", &self.with_keywords);
        push_text(&mut pairs, "without_keywords", &self.without_keywords);
        push_text(&mut pairs, "certification", &self.certification);
        push_text(&mut pairs, "certification.gte", &self.certification_gte);
        push_text(&mut pairs, "certification.lte", &self.certification_lte);
        push_text(&mut pairs, "certification_country", &self.certification_country);
        push_text(&mut pairs, "watch_region", &self.watch_region);
        push_text(&mut pairs, "with_watch_providers", &self.with_watch_providers);
        push_text(
            &mut pairs,
            "without_watch_providers",
            &self.without_watch_providers,
        );
        push_text(
            &mut pairs,
            "with_watch_monetization_types",
            &self.with_watch_monetization_types,
        );
        pairs
    }
}

fn push_text(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
    if let Some(v) = value {
        if !v.is_empty() {
            pairs.push((key, v.clone()));
        }
    }
}

fn push_value<T: ToString>(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<T>) {
    if let Some(v) = value {
        pairs.push((key, v.to_string()));
    }
}

/// Percent-encodes values and joins the pairs into a query string.
pub fn encode_query(pairs: &[(&'static str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_emit_exactly_sort_language_and_adult() {
        let filters = DiscoverFilters {
            sort_by: SortBy::desc(SortField::Popularity),
            ..Default::default()
        };
        assert_eq!(
            filters.to_query(),
            vec![
                ("sort_by", "popularity.desc".to_string()),
                ("language", "en-US".to_string()),
                ("include_adult", "false".to_string()),
            ]
        );
    }

    #[test]
    fn set_fields_are_stringified_verbatim() {
        let filters = DiscoverFilters {
            sort_by: SortBy::desc(SortField::Rating),
            include_adult: Some(true),
            primary_release_year: Some(2021),
            vote_average_gte: Some(7.5),
            vote_count_gte: Some(200),
            with_runtime_lte: Some(150),
            with_genres: Some(any_of(&[28, 12])),
            with_keywords: Some(all_of(&[9715, 818])),
            ..Default::default()
        };
        let q = filters.to_query();
        let get = |key| {
            q.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("sort_by"), Some("vote_average.desc"));
        assert_eq!(get("include_adult"), Some("true"));
        assert_eq!(get("primary_release_year"), Some("2021"));
        assert_eq!(get("vote_average.gte"), Some("7.5"));
        assert_eq!(get("vote_count.gte"), Some("200"));
        assert_eq!(get("with_runtime.lte"), Some("150"));
        assert_eq!(get("with_genres"), Some("28|12"));
        assert_eq!(get("with_keywords"), Some("9715,818"));
    }

    #[test]
    fn empty_strings_are_dropped_not_emitted_blank() {
        let filters = DiscoverFilters {
            with_genres: Some(String::new()),
            region: Some(String::new()),
            ..Default::default()
        };
        let q = filters.to_query();
        assert!(q.iter().all(|(k, _)| *k != "with_genres" && *k != "region"));
    }

    #[test]
    fn out_of_range_values_pass_through_unvalidated() {
        let filters = DiscoverFilters {
            vote_average_gte: Some(99.0),
            ..Default::default()
        };
        let q = filters.to_query();
        assert!(q.contains(&("vote_average.gte", "99".to_string())));
    }

    #[test]
    fn explicit_language_overrides_default_once() {
        let filters = DiscoverFilters {
            language: Some("de-DE".to_string()),
            ..Default::default()
        };
        let q = filters.to_query();
        let languages: Vec<_> = q.iter().filter(|(k, _)| *k == "language").collect();
        assert_eq!(languages, vec![&("language", "de-DE".to_string())]);
    }

    #[test]
    fn join_helpers_preserve_or_vs_and_separators() {
        assert_eq!(any_of(&[28, 12, 16]), "28|12|16");
        assert_eq!(all_of(&[28, 12]), "28,12");
        assert_eq!(any_of(&[28]), "28");
        assert_eq!(any_of(&[]), "");
    }

    #[test]
    fn encode_query_escapes_values() {
        let pairs = vec![("with_cast", "500|287".to_string())];
        assert_eq!(encode_query(&pairs), "with_cast=500%7C287");
    }

    #[test]
    fn sort_parse_accepts_aliases_and_directions() {
        assert_eq!(SortBy::parse("rating"), Some(SortBy::desc(SortField::Rating)));
        assert_eq!(
            SortBy::parse("rating.asc"),
            Some(SortBy::asc(SortField::Rating))
        );
        assert_eq!(
            SortBy::parse("primary_release_date.desc"),
            Some(SortBy::desc(SortField::ReleaseDate))
        );
        assert_eq!(SortBy::parse("title.asc").map(SortBy::as_str), Some("original_title.asc"));
        assert_eq!(SortBy::parse("bogus"), None);
        assert_eq!(SortBy::parse("rating.sideways"), None);
    }
}
