use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::models::{Movie, Page};
use crate::query::{Direction, DiscoverFilters};
use crate::tmdb::{ApiError, MovieApi};

/// Quiet interval a query edit must survive before a request is issued.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(400);

/// Tracks the last edit time and answers "has the input been quiet long
/// enough". Callers pass `Instant`s in so tests never have to sleep.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    last_edit: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_edit: None,
        }
    }

    /// Records an edit, restarting the quiet interval.
    pub fn touch(&mut self, now: Instant) {
        self.last_edit = Some(now);
    }

    /// True once the quiet interval has elapsed since the last edit.
    /// Consumes the pending edit so each burst fires at most once.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.last_edit {
            Some(at) if now.duration_since(at) >= self.quiet => {
                self.last_edit = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> bool {
        self.last_edit.is_some()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

/// Where the controller is in its load cycle. `loading_more` is tracked
/// separately; `Loading` means a fresh load that will replace results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// What to fetch. A non-empty query always means text search; filters only
/// drive requests when the query is empty. The two modes never mix.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPlan {
    Search { query: String, include_adult: bool },
    Discover { filters: DiscoverFilters },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Fresh,
    More,
}

/// A ticket for one in-flight request. `finish` only applies a ticket whose
/// generation still matches the controller's, so responses for superseded
/// criteria are discarded no matter when they arrive.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    generation: u64,
    kind: RequestKind,
    pub plan: FetchPlan,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Stale,
    Failed,
}

/// Search/discovery state machine: committed criteria, accumulated results,
/// page cursor, and a generation counter that invalidates in-flight work
/// whenever the criteria change.
#[derive(Debug, Default)]
pub struct SearchController {
    query: String,
    filters: DiscoverFilters,
    include_adult: bool,
    results: Vec<Movie>,
    page: u32,
    total_pages: u32,
    phase: Phase,
    loading_more: bool,
    generation: u64,
    search_rating_order: Option<Direction>,
}

impl SearchController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direction of the local rating re-sort applied to fresh text-search
    /// results. Defaults to ascending.
    pub fn set_search_rating_order(&mut self, direction: Direction) {
        self.search_rating_order = Some(direction);
    }

    pub fn results(&self) -> &[Movie] {
        &self.results
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filters(&self) -> &DiscoverFilters {
        &self.filters
    }

    pub fn loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// More pages exist only while the cursor is strictly below the
    /// reported total.
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }

    /// Commits an edited query. Non-empty text starts a fresh search; empty
    /// text falls back to discovery with the current filters, defaults
    /// included, so a cleared box shows the default popularity listing.
    pub fn apply_query(&mut self, query: &str) -> SearchRequest {
        self.query = query.trim().to_string();
        self.fresh()
    }

    /// Commits new filter criteria. Filters and text search are exclusive,
    /// so any pending query is dropped and discovery takes over.
    pub fn apply_filters(&mut self, filters: DiscoverFilters) -> SearchRequest {
        if !self.query.is_empty() {
            debug!(query = %self.query, "filters applied, clearing text query");
            self.query.clear();
        }
        self.filters = filters;
        self.fresh()
    }

    /// Flips the adult-content toggle and re-runs whatever mode is active.
    pub fn apply_include_adult(&mut self, include_adult: bool) -> SearchRequest {
        self.include_adult = include_adult;
        self.fresh()
    }

    /// Re-issues the current criteria from page 1, e.g. after a failure.
    pub fn refresh(&mut self) -> SearchRequest {
        self.fresh()
    }

    /// Drops all criteria and results.
    pub fn reset(&mut self) {
        self.query.clear();
        self.filters = DiscoverFilters::default();
        self.clear_results();
    }

    /// Starts fetching the next page, or `None` when a fresh load is in
    /// flight, another page is already loading, or the listing is exhausted.
    pub fn begin_load_more(&mut self) -> Option<SearchRequest> {
        if self.phase == Phase::Loading || self.loading_more || !self.has_more() {
            return None;
        }
        self.loading_more = true;
        Some(SearchRequest {
            generation: self.generation,
            kind: RequestKind::More,
            plan: self.plan(),
            page: self.page + 1,
        })
    }

    /// The single commit point. A ticket from a superseded generation is
    /// discarded whole; nothing else about the controller changes.
    pub fn finish(
        &mut self,
        request: &SearchRequest,
        result: Result<Page<Movie>, ApiError>,
    ) -> Outcome {
        if request.generation != self.generation {
            debug!(
                got = request.generation,
                current = self.generation,
                "discarding stale response"
            );
            return Outcome::Stale;
        }
        match (request.kind, result) {
            (RequestKind::Fresh, Ok(page)) => {
                let mut results = page.results;
                if matches!(request.plan, FetchPlan::Search { .. }) {
                    // Text search comes back in relevance order; present it
                    // by rating instead. The search endpoint has no sort
                    // parameter of its own.
                    let order = self.search_rating_order.unwrap_or(Direction::Asc);
                    results.sort_by(|a, b| {
                        let cmp = a
                            .vote_average
                            .partial_cmp(&b.vote_average)
                            .unwrap_or(Ordering::Equal);
                        match order {
                            Direction::Asc => cmp,
                            Direction::Desc => cmp.reverse(),
                        }
                    });
                }
                self.results = results;
                self.page = page.page;
                self.total_pages = page.total_pages;
                self.phase = Phase::Ready;
                Outcome::Applied
            }
            (RequestKind::More, Ok(page)) => {
                let seen: HashSet<u64> = self.results.iter().map(|m| m.id).collect();
                self.results
                    .extend(page.results.into_iter().filter(|m| !seen.contains(&m.id)));
                self.page = page.page;
                self.total_pages = page.total_pages;
                self.loading_more = false;
                Outcome::Applied
            }
            (RequestKind::Fresh, Err(err)) => {
                // Previous results stay on screen alongside the failure.
                warn!(error = %err, page = request.page, "fresh load failed");
                self.phase = Phase::Failed;
                Outcome::Failed
            }
            (RequestKind::More, Err(err)) => {
                warn!(error = %err, page = request.page, "load more failed");
                self.loading_more = false;
                Outcome::Failed
            }
        }
    }

    /// Runs one request against the API and commits the result.
    pub async fn run(&mut self, api: &dyn MovieApi, request: SearchRequest) -> Outcome {
        let result = execute(api, &request).await;
        self.finish(&request, result)
    }

    fn plan(&self) -> FetchPlan {
        if self.query.is_empty() {
            // The adult toggle is controller state in both modes; it
            // overrides whatever the filter object carries.
            let mut filters = self.filters.clone();
            filters.include_adult = Some(self.include_adult);
            FetchPlan::Discover { filters }
        } else {
            FetchPlan::Search {
                query: self.query.clone(),
                include_adult: self.include_adult,
            }
        }
    }

    fn fresh(&mut self) -> SearchRequest {
        self.generation += 1;
        self.loading_more = false;
        self.phase = Phase::Loading;
        SearchRequest {
            generation: self.generation,
            kind: RequestKind::Fresh,
            plan: self.plan(),
            page: 1,
        }
    }

    fn clear_results(&mut self) {
        self.generation += 1;
        self.results.clear();
        self.page = 0;
        self.total_pages = 0;
        self.loading_more = false;
        self.phase = Phase::Idle;
    }
}

/// Dispatches one request to the matching endpoint.
pub async fn execute(
    api: &dyn MovieApi,
    request: &SearchRequest,
) -> Result<Page<Movie>, ApiError> {
    match &request.plan {
        FetchPlan::Search {
            query,
            include_adult,
        } => api.search(query, *include_adult, request.page).await,
        FetchPlan::Discover { filters } => api.discover(filters, request.page).await,
    }
}
