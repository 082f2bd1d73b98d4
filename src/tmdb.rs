use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::env;
use thiserror::Error;
use tracing::debug;

use crate::models::{CreditsResponse, GenreListResponse, Movie, Page, VideosResponse};
use crate::query::{encode_query, DiscoverFilters, SortBy, SortField, DEFAULT_LANGUAGE};

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";

/// Vote-count floor applied to rating-sorted listings so obscure titles
/// with a handful of perfect scores don't dominate.
pub const RATING_VOTE_FLOOR: u32 = 200;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Upstream answered with a non-success status.
    #[error("request failed: {status}")]
    RequestFailed { status: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Config(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// The fixed endpoint catalog. Every method maps to exactly one upstream
/// route; orchestration layers depend on this trait, never on the client,
/// so tests can substitute a fake.
#[async_trait]
pub trait MovieApi: Send + Sync {
    async fn trending(&self, page: u32) -> ApiResult<Page<Movie>>;
    async fn now_playing(&self, page: u32) -> ApiResult<Page<Movie>>;
    async fn upcoming(&self, page: u32) -> ApiResult<Page<Movie>>;
    async fn popular(&self, page: u32) -> ApiResult<Page<Movie>>;
    async fn top_rated(&self, page: u32) -> ApiResult<Page<Movie>>;
    async fn by_genre(&self, genre_id: u64, sort: Option<SortBy>, page: u32)
        -> ApiResult<Page<Movie>>;
    async fn by_year(&self, year: i32, page: u32) -> ApiResult<Page<Movie>>;
    async fn search(&self, query: &str, include_adult: bool, page: u32) -> ApiResult<Page<Movie>>;
    async fn discover(&self, filters: &DiscoverFilters, page: u32) -> ApiResult<Page<Movie>>;
    async fn genre_list(&self) -> ApiResult<GenreListResponse>;
    async fn movie_details(&self, id: u64) -> ApiResult<Movie>;
    async fn credits(&self, id: u64) -> ApiResult<CreditsResponse>;
    async fn videos(&self, id: u64) -> ApiResult<VideosResponse>;
    async fn similar(&self, id: u64, page: u32) -> ApiResult<Page<Movie>>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    token: String,
}

impl TmdbClient {
    pub fn new(token: String) -> Self {
        Self {
            client: Client::new(),
            token,
        }
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::from_token(env::var("TMDB_API_KEY"))
    }

    fn from_token(token: Result<String, env::VarError>) -> ApiResult<Self> {
        let token = token.map_err(|_| ApiError::Config("TMDB_API_KEY not set".to_string()))?;
        Ok(Self::new(token))
    }

    /// Authenticated GET, parsed in two steps so a decode failure still had
    /// the full body available for the status check.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        debug!(%url, "tmdb request");
        let res = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header("accept", "application/json")
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            return Err(ApiError::RequestFailed {
                status: status.to_string(),
            });
        }
        let text = res.text().await?;
        let parsed: T = serde_json::from_str(&text)?;
        Ok(parsed)
    }

    async fn get_page(&self, path: &str, page: u32) -> ApiResult<Page<Movie>> {
        let url = format!(
            "{TMDB_BASE}{path}?language={DEFAULT_LANGUAGE}&page={page}"
        );
        self.get_json(&url).await
    }

    async fn discover_page(
        &self,
        filters: &DiscoverFilters,
        page: u32,
    ) -> ApiResult<Page<Movie>> {
        let query = encode_query(&filters.to_query());
        let url = format!("{TMDB_BASE}/discover/movie?{query}&page={page}");
        self.get_json(&url).await
    }
}

#[async_trait]
impl MovieApi for TmdbClient {
    async fn trending(&self, page: u32) -> ApiResult<Page<Movie>> {
        // The home row is a plain popularity-ordered discover, videos and
        // adult titles excluded.
        let filters = DiscoverFilters {
            include_video: Some(false),
            ..Default::default()
        };
        self.discover_page(&filters, page).await
    }

    async fn now_playing(&self, page: u32) -> ApiResult<Page<Movie>> {
        self.get_page("/movie/now_playing", page).await
    }

    async fn upcoming(&self, page: u32) -> ApiResult<Page<Movie>> {
        self.get_page("/movie/upcoming", page).await
    }

    async fn popular(&self, page: u32) -> ApiResult<Page<Movie>> {
        self.get_page("/movie/popular", page).await
    }

    async fn top_rated(&self, page: u32) -> ApiResult<Page<Movie>> {
        self.get_page("/movie/top_rated", page).await
    }

    async fn by_genre(
        &self,
        genre_id: u64,
        sort: Option<SortBy>,
        page: u32,
    ) -> ApiResult<Page<Movie>> {
        let filters = DiscoverFilters {
            sort_by: sort.unwrap_or_default(),
            with_genres: Some(genre_id.to_string()),
            ..Default::default()
        };
        self.discover_page(&filters, page).await
    }

    async fn by_year(&self, year: i32, page: u32) -> ApiResult<Page<Movie>> {
        self.discover_page(&by_year_filters(year), page).await
    }

    async fn search(&self, query: &str, include_adult: bool, page: u32) -> ApiResult<Page<Movie>> {
        let url = format!(
            "{TMDB_BASE}/search/movie?query={}&include_adult={include_adult}&language={DEFAULT_LANGUAGE}&page={page}",
            urlencoding::encode(query)
        );
        self.get_json(&url).await
    }

    async fn discover(&self, filters: &DiscoverFilters, page: u32) -> ApiResult<Page<Movie>> {
        self.discover_page(filters, page).await
    }

    async fn genre_list(&self) -> ApiResult<GenreListResponse> {
        let url = format!("{TMDB_BASE}/genre/movie/list?language={DEFAULT_LANGUAGE}");
        self.get_json(&url).await
    }

    async fn movie_details(&self, id: u64) -> ApiResult<Movie> {
        let url = format!("{TMDB_BASE}/movie/{id}?language={DEFAULT_LANGUAGE}");
        self.get_json(&url).await
    }

    async fn credits(&self, id: u64) -> ApiResult<CreditsResponse> {
        let url = format!("{TMDB_BASE}/movie/{id}/credits?language={DEFAULT_LANGUAGE}");
        self.get_json(&url).await
    }

    async fn videos(&self, id: u64) -> ApiResult<VideosResponse> {
        let url = format!("{TMDB_BASE}/movie/{id}/videos?language={DEFAULT_LANGUAGE}");
        self.get_json(&url).await
    }

    async fn similar(&self, id: u64, page: u32) -> ApiResult<Page<Movie>> {
        self.get_page(&format!("/movie/{id}/similar"), page).await
    }
}

/// Year browsing is a discovery query pinned to that release year, sorted
/// by rating with the usual vote floor.
pub fn by_year_filters(year: i32) -> DiscoverFilters {
    DiscoverFilters {
        sort_by: SortBy::desc(SortField::Rating),
        primary_release_year: Some(year),
        vote_count_gte: Some(RATING_VOTE_FLOOR),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_year_pins_year_floor_and_rating_sort() {
        let q = by_year_filters(1994).to_query();
        assert!(q.contains(&("sort_by", "vote_average.desc".to_string())));
        assert!(q.contains(&("primary_release_year", "1994".to_string())));
        assert!(q.contains(&("vote_count.gte", "200".to_string())));
    }

    #[test]
    fn missing_token_is_a_config_error() {
        match TmdbClient::from_token(Err(env::VarError::NotPresent)) {
            Err(ApiError::Config(msg)) => assert!(msg.contains("TMDB_API_KEY")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
