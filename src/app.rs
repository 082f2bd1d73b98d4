use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::favorites::{Favorites, FileStore, KeyValueStore};
use crate::models::{Genre, Movie};
use crate::query::{any_of, DiscoverFilters, SortBy};
use crate::search::{Debouncer, Outcome, SearchController, SEARCH_DEBOUNCE};
use crate::tmdb::{ApiResult, MovieApi, TmdbClient};

const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub struct App<S: KeyValueStore> {
    api: Arc<dyn MovieApi>,
    favorites: Favorites<S>,
    controller: SearchController,
    debouncer: Debouncer,
    // Fetched once on first use; the catalog never changes mid-session.
    genres: Option<Vec<Genre>>,
}

pub async fn run() -> Result<()> {
    let api: Arc<dyn MovieApi> = Arc::new(TmdbClient::from_env()?);
    let favorites = Favorites::load(FileStore::new()?);
    let mut app = App::new(api, favorites);
    app.repl().await
}

impl<S: KeyValueStore> App<S> {
    pub fn new(api: Arc<dyn MovieApi>, favorites: Favorites<S>) -> Self {
        Self {
            api,
            favorites,
            controller: SearchController::new(),
            debouncer: Debouncer::default(),
            genres: None,
        }
    }

    async fn repl(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut out = tokio::io::stdout();
        out.write_all(b"cinescout ready, type `help` for commands\n> ")
            .await?;
        out.flush().await?;
        while let Some(line) = lines.next_line().await? {
            if !self.dispatch(line.trim()).await? {
                break;
            }
            out.write_all(b"> ").await?;
            out.flush().await?;
        }
        Ok(())
    }

    /// Returns false when the session should end.
    async fn dispatch(&mut self, line: &str) -> Result<bool> {
        let (cmd, rest) = match line.split_once(' ') {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };
        match cmd {
            "" => {}
            "quit" | "exit" => return Ok(false),
            "help" => self.print_help(),
            "search" => self.search(rest).await,
            "filter" => self.filter(rest).await,
            "adult" => self.toggle_adult(rest).await,
            "clear" => {
                self.controller.reset();
                println!("cleared");
            }
            "more" => self.more().await,
            "retry" => self.retry().await,
            "details" => self.details(rest).await,
            "save" => self.save(rest).await,
            "unsave" => self.unsave(rest).await,
            "saved" => self.print_saved(),
            "genres" => self.print_genres().await,
            "color" => self.set_color(rest),
            "similar" => self.browse("similar", rest).await,
            "genre" => self.by_genre(rest).await,
            "trending" => self.browse("trending", rest).await,
            "nowplaying" => self.browse("nowplaying", rest).await,
            "upcoming" => self.browse("upcoming", rest).await,
            "popular" => self.browse("popular", rest).await,
            "toprated" => self.browse("toprated", rest).await,
            "year" => self.browse("year", rest).await,
            other => println!("unknown command `{other}`, try `help`"),
        }
        Ok(true)
    }

    /// Text search goes through the debouncer like any interactive input
    /// surface would: the request fires only after the quiet interval.
    async fn search(&mut self, text: &str) {
        self.debouncer.touch(Instant::now());
        tokio::time::sleep(SEARCH_DEBOUNCE).await;
        if !self.debouncer.fire(Instant::now()) {
            return;
        }
        let request = self.controller.apply_query(text);
        let outcome = self.controller.run(self.api.as_ref(), request).await;
        self.report(outcome).await;
    }

    async fn filter(&mut self, spec: &str) {
        let genres = self.genre_catalog().await;
        let filters = match parse_filter_spec(spec, genres.as_deref()) {
            Ok(f) => f,
            Err(msg) => {
                println!("{msg}");
                return;
            }
        };
        let request = self.controller.apply_filters(filters);
        let outcome = self.controller.run(self.api.as_ref(), request).await;
        self.report(outcome).await;
    }

    async fn toggle_adult(&mut self, arg: &str) {
        let enabled = matches!(arg, "on" | "true");
        let request = self.controller.apply_include_adult(enabled);
        let outcome = self.controller.run(self.api.as_ref(), request).await;
        self.report(outcome).await;
    }

    async fn more(&mut self) {
        match self.controller.begin_load_more() {
            Some(request) => {
                let before = self.controller.results().len();
                let outcome = self.controller.run(self.api.as_ref(), request).await;
                if outcome == Outcome::Applied {
                    let added = self.controller.results().len() - before;
                    println!("(+{added} results, page {})", self.controller.page());
                    self.print_results(before);
                } else {
                    println!("load more failed, `retry` to try again");
                }
            }
            None => println!("(no more pages)"),
        }
    }

    async fn retry(&mut self) {
        let request = self.controller.refresh();
        let outcome = self.controller.run(self.api.as_ref(), request).await;
        self.report(outcome).await;
    }

    async fn details(&mut self, arg: &str) {
        let Some(id) = parse_id(arg) else {
            println!("usage: details <movie-id>");
            return;
        };
        match self.api.movie_details(id).await {
            Ok(movie) => {
                self.print_movie_detail(&movie);
                if let Ok(credits) = self.api.credits(id).await {
                    let names: Vec<&str> =
                        credits.cast.iter().take(5).map(|c| c.name.as_str()).collect();
                    if !names.is_empty() {
                        println!("  cast: {}", names.join(", "));
                    }
                }
                if let Ok(videos) = self.api.videos(id).await {
                    if let Some(trailer) = videos
                        .results
                        .iter()
                        .find(|v| v.site == "YouTube" && v.kind == "Trailer")
                    {
                        println!("  trailer: https://www.youtube.com/watch?v={}", trailer.key);
                    }
                }
            }
            Err(e) => println!("details failed: {e}"),
        }
    }

    async fn save(&mut self, arg: &str) {
        let Some(id) = parse_id(arg) else {
            println!("usage: save <movie-id>");
            return;
        };
        // Prefer the listing we already have; fall back to a detail fetch.
        let movie = match self.controller.results().iter().find(|m| m.id == id) {
            Some(m) => m.clone(),
            None => match self.api.movie_details(id).await {
                Ok(m) => m,
                Err(e) => {
                    println!("could not fetch movie {id}: {e}");
                    return;
                }
            },
        };
        let title = movie.title.clone();
        if self.favorites.save(movie) {
            println!("saved: {title}");
        } else {
            println!("not saved (already in the list or storage failed)");
        }
    }

    async fn unsave(&mut self, arg: &str) {
        let Some(id) = parse_id(arg) else {
            println!("usage: unsave <movie-id>");
            return;
        };
        if self.favorites.remove(id) {
            println!("removed {id}");
        } else {
            println!("remove failed");
        }
    }

    fn print_saved(&self) {
        if self.favorites.all().is_empty() {
            println!("(no saved movies)");
            return;
        }
        for s in self.favorites.all() {
            println!(
                "  {:>8}  {}  ({})",
                s.movie.id,
                s.movie.title,
                s.movie.year().unwrap_or("----")
            );
        }
    }

    async fn print_genres(&mut self) {
        match self.genre_catalog().await {
            Some(genres) => {
                for g in genres {
                    println!("  {:>5}  {}", g.id, g.name);
                }
            }
            None => println!("genre list unavailable"),
        }
    }

    fn set_color(&mut self, arg: &str) {
        let enabled = matches!(arg, "on" | "true");
        if self.favorites.set_color_output(enabled) {
            println!("color output {}", if enabled { "on" } else { "off" });
        } else {
            println!("could not persist preference");
        }
    }

    /// Curated rows and year browsing print directly; they are one-shot
    /// listings, not part of the search/filter session.
    async fn browse(&mut self, row: &str, rest: &str) {
        let page = rest.parse().unwrap_or(1);
        match self.fetch_row(row, rest, page).await {
            Ok(page) => self.print_page(&page),
            Err(e) => println!("fetch failed: {e}"),
        }
    }

    /// Genre row: a catalog name or raw id, with optional sort and page,
    /// e.g. `genre action rating.desc 2`.
    async fn by_genre(&mut self, rest: &str) {
        let mut parts = rest.split_whitespace();
        let Some(which) = parts.next() else {
            println!("usage: genre <id|name> [sort] [page]");
            return;
        };
        let sort = parts.next().and_then(SortBy::parse);
        let page = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
        let catalog = self.genre_catalog().await;
        let genre_id = match resolve_genres(which, catalog.as_deref()) {
            Ok(ids) if !ids.is_empty() => ids[0],
            Ok(_) => return,
            Err(msg) => {
                println!("{msg}");
                return;
            }
        };
        match self.api.by_genre(genre_id, sort, page).await {
            Ok(page) => self.print_page(&page),
            Err(e) => println!("fetch failed: {e}"),
        }
    }

    fn print_page(&self, page: &crate::models::Page<Movie>) {
        if page.results.is_empty() {
            println!("(no results)");
        }
        let color = self.favorites.color_output();
        for m in &page.results {
            print_movie_line(m, color, self.favorites.contains(m.id));
        }
        println!(
            "{DIM}page {}/{} ({} total){RESET}",
            page.page, page.total_pages, page.total_results
        );
    }

    async fn fetch_row(
        &self,
        row: &str,
        rest: &str,
        page: u32,
    ) -> ApiResult<crate::models::Page<Movie>> {
        match row {
            "trending" => self.api.trending(page).await,
            "nowplaying" => self.api.now_playing(page).await,
            "upcoming" => self.api.upcoming(page).await,
            "popular" => self.api.popular(page).await,
            "toprated" => self.api.top_rated(page).await,
            "year" => {
                let mut parts = rest.split_whitespace();
                let year = parts
                    .next()
                    .and_then(|y| y.parse().ok())
                    .unwrap_or(2024);
                let page = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
                self.api.by_year(year, page).await
            }
            "similar" => {
                let mut parts = rest.split_whitespace();
                let id = parts.next().and_then(|i| i.parse().ok()).unwrap_or(0);
                let page = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
                self.api.similar(id, page).await
            }
            _ => unreachable!("dispatch only routes known rows"),
        }
    }

    async fn report(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Applied => {
                if self.controller.results().is_empty() {
                    println!("(no results)");
                } else {
                    self.print_results(0);
                    if self.controller.has_more() {
                        println!("{DIM}`more` for the next page{RESET}");
                    }
                }
            }
            Outcome::Failed => {
                println!("request failed, `retry` to try again");
                if !self.controller.results().is_empty() {
                    println!("(previous results kept)");
                }
            }
            Outcome::Stale => {}
        }
    }

    fn print_results(&self, from: usize) {
        let color = self.favorites.color_output();
        for m in &self.controller.results()[from..] {
            print_movie_line(m, color, self.favorites.contains(m.id));
        }
    }

    fn print_movie_detail(&self, m: &Movie) {
        println!("{} ({})", m.title, m.year().unwrap_or("----"));
        if let Some(tagline) = m.tagline.as_deref().filter(|t| !t.is_empty()) {
            println!("  \"{tagline}\"");
        }
        println!("  rating {:.1}", m.vote_average);
        if let Some(runtime) = m.runtime {
            println!("  runtime {runtime} min");
        }
        if let Some(genres) = &m.genres {
            let names: Vec<&str> = genres.iter().map(|g| g.name.as_str()).collect();
            println!("  genres: {}", names.join(", "));
        }
        if !m.overview.is_empty() {
            println!("  {}", m.overview);
        }
        if let Some(url) = m.poster_url() {
            println!("  poster: {url}");
        }
    }

    async fn genre_catalog(&mut self) -> Option<Vec<Genre>> {
        if self.genres.is_none() {
            match self.api.genre_list().await {
                Ok(list) => {
                    info!(count = list.genres.len(), "genre catalog loaded");
                    self.genres = Some(list.genres);
                }
                Err(e) => warn!(error = %e, "genre catalog fetch failed"),
            }
        }
        self.genres.clone()
    }

    fn print_help(&self) {
        println!(
            "\
commands:
  search <text>          text search (debounced)
  filter <k=v ...>       discovery filters, e.g. genre=Action|12 year=2021
                         rating>=7 votes>=200 runtime<=150 sort=rating
                         from=2020-01-01 to=2021-12-31
  adult on|off           include adult titles and re-run
  more                   next page of the current listing
  retry                  re-run the current criteria
  clear                  drop criteria and results
  trending|nowplaying|upcoming|popular|toprated [page]
  genre <id|name> [sort] [page]
  year <yyyy> [page]     best-of listing for a release year
  similar <id> [page]    movies similar to the given one
  details <id>           full record with cast and trailer
  save|unsave <id>       manage the saved list
  saved                  list saved movies
  genres                 genre catalog
  color on|off           colored output preference
  quit"
        );
    }
}

fn print_movie_line(m: &Movie, color: bool, saved: bool) {
    let marker = if saved { "*" } else { " " };
    if color {
        println!(
            "{marker} {:>8}  {GREEN}{}{RESET}  ({})  {DIM}{:.1}{RESET}",
            m.id,
            m.title,
            m.year().unwrap_or("----"),
            m.vote_average
        );
    } else {
        println!(
            "{marker} {:>8}  {}  ({})  {:.1}",
            m.id,
            m.title,
            m.year().unwrap_or("----"),
            m.vote_average
        );
    }
}

fn parse_id(arg: &str) -> Option<u64> {
    arg.parse().ok()
}

/// Parses `key=value` tokens into discovery filters. Genres accept names
/// from the catalog or raw ids, pipe-separated for OR.
fn parse_filter_spec(spec: &str, genres: Option<&[Genre]>) -> Result<DiscoverFilters, String> {
    let mut filters = DiscoverFilters::default();
    for token in spec.split_whitespace() {
        if let Some(value) = token.strip_prefix("genre=") {
            let ids = resolve_genres(value, genres)?;
            filters.with_genres = Some(any_of(&ids));
        } else if let Some(value) = token.strip_prefix("year=") {
            filters.primary_release_year =
                Some(value.parse().map_err(|_| format!("bad year `{value}`"))?);
        } else if let Some(value) = token.strip_prefix("rating>=") {
            filters.vote_average_gte =
                Some(value.parse().map_err(|_| format!("bad rating `{value}`"))?);
        } else if let Some(value) = token.strip_prefix("rating<=") {
            filters.vote_average_lte =
                Some(value.parse().map_err(|_| format!("bad rating `{value}`"))?);
        } else if let Some(value) = token.strip_prefix("votes>=") {
            filters.vote_count_gte =
                Some(value.parse().map_err(|_| format!("bad count `{value}`"))?);
        } else if let Some(value) = token.strip_prefix("runtime>=") {
            filters.with_runtime_gte =
                Some(value.parse().map_err(|_| format!("bad runtime `{value}`"))?);
        } else if let Some(value) = token.strip_prefix("runtime<=") {
            filters.with_runtime_lte =
                Some(value.parse().map_err(|_| format!("bad runtime `{value}`"))?);
        } else if let Some(value) = token.strip_prefix("from=") {
            filters.release_date_gte = Some(value.to_string());
        } else if let Some(value) = token.strip_prefix("to=") {
            filters.release_date_lte = Some(value.to_string());
        } else if let Some(value) = token.strip_prefix("sort=") {
            filters.sort_by =
                SortBy::parse(value).ok_or_else(|| format!("unknown sort `{value}`"))?;
        } else if let Some(value) = token.strip_prefix("region=") {
            filters.region = Some(value.to_string());
        } else if let Some(value) = token.strip_prefix("cast=") {
            filters.with_cast = Some(value.to_string());
        } else if let Some(value) = token.strip_prefix("keywords=") {
            filters.with_keywords = Some(value.to_string());
        } else {
            return Err(format!("unknown filter `{token}`, try `help`"));
        }
    }
    Ok(filters)
}

fn resolve_genres(value: &str, catalog: Option<&[Genre]>) -> Result<Vec<u64>, String> {
    value
        .split('|')
        .map(|part| {
            if let Ok(id) = part.parse() {
                return Ok(id);
            }
            catalog
                .and_then(|genres| {
                    genres
                        .iter()
                        .find(|g| g.name.eq_ignore_ascii_case(part))
                        .map(|g| g.id)
                })
                .ok_or_else(|| format!("unknown genre `{part}`"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Direction, SortField};

    fn catalog() -> Vec<Genre> {
        vec![
            Genre {
                id: 28,
                name: "Action".to_string(),
            },
            Genre {
                id: 12,
                name: "Adventure".to_string(),
            },
        ]
    }

    #[test]
    fn filter_spec_mixes_names_and_ids() {
        let f = parse_filter_spec("genre=action|12 year=2021 rating>=7", Some(&catalog())).unwrap();
        assert_eq!(f.with_genres.as_deref(), Some("28|12"));
        assert_eq!(f.primary_release_year, Some(2021));
        assert_eq!(f.vote_average_gte, Some(7.0));
    }

    #[test]
    fn filter_spec_rejects_unknown_tokens() {
        assert!(parse_filter_spec("bogus=1", None).is_err());
        assert!(parse_filter_spec("genre=NoSuchGenre", Some(&catalog())).is_err());
    }

    #[test]
    fn sort_token_maps_to_typed_sort() {
        let f = parse_filter_spec("sort=rating.asc", None).unwrap();
        assert_eq!(f.sort_by.field, SortField::Rating);
        assert_eq!(f.sort_by.direction, Direction::Asc);
    }
}
