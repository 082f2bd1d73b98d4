use serde::{Deserialize, Serialize};

pub const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/w1280";

/// A catalog record as returned by TMDB. `id` is the only identity key:
/// two movies with the same id are the same entity regardless of which
/// response shape they came from.
///
/// List endpoints carry `genre_ids`; the single-movie detail endpoint
/// carries full `genres` objects instead. The two never appear together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    /// ISO date, empty for unreleased titles.
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<Genre>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
}

impl Movie {
    /// Full poster URL, or `None` when the record has no usable path.
    pub fn poster_url(&self) -> Option<String> {
        image_url(POSTER_BASE, self.poster_path.as_deref())
    }

    pub fn backdrop_url(&self) -> Option<String> {
        image_url(BACKDROP_BASE, self.backdrop_path.as_deref())
    }

    pub fn year(&self) -> Option<&str> {
        self.release_date.split('-').next().filter(|y| !y.is_empty())
    }
}

fn image_url(base: &str, path: Option<&str>) -> Option<String> {
    path.filter(|p| !p.is_empty()).map(|p| format!("{base}{p}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreListResponse {
    pub genres: Vec<Genre>,
}

/// Envelope returned by every paginated list endpoint. Upstream pages may
/// overlap in id at the boundary; accumulating consumers de-duplicate.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub page: u32,
    pub results: Vec<T>,
    pub total_pages: u32,
    pub total_results: u32,
}

/// A bookmarked movie. `saved_at` is written once at save time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedMovie {
    #[serde(flatten)]
    pub movie: Movie,
    pub saved_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastMember {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub character: String,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditsResponse {
    pub id: u64,
    pub cast: Vec<CastMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub id: String,
    pub key: String,
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub official: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideosResponse {
    pub id: u64,
    pub results: Vec<Video>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(poster: Option<&str>) -> Movie {
        Movie {
            id: 550,
            title: "Fight Club".to_string(),
            overview: String::new(),
            poster_path: poster.map(String::from),
            backdrop_path: None,
            release_date: "1999-10-15".to_string(),
            vote_average: 8.4,
            genre_ids: None,
            genres: None,
            runtime: None,
            status: None,
            tagline: None,
        }
    }

    #[test]
    fn poster_url_prefixes_base_and_size() {
        let m = movie(Some("/abc.jpg"));
        assert_eq!(
            m.poster_url().as_deref(),
            Some("https://image.tmdb.org/t/p/w500/abc.jpg")
        );
    }

    #[test]
    fn missing_or_empty_path_resolves_to_no_image() {
        assert_eq!(movie(None).poster_url(), None);
        assert_eq!(movie(Some("")).poster_url(), None);
    }

    #[test]
    fn year_is_empty_for_unreleased_titles() {
        let mut m = movie(None);
        assert_eq!(m.year(), Some("1999"));
        m.release_date.clear();
        assert_eq!(m.year(), None);
    }

    #[test]
    fn list_and_detail_shapes_both_deserialize() {
        let list: Movie = serde_json::from_str(
            r#"{"id":1,"title":"A","poster_path":null,"backdrop_path":null,
                "release_date":"2020-01-01","vote_average":7.1,"genre_ids":[28,12]}"#,
        )
        .unwrap();
        assert_eq!(list.genre_ids.as_deref(), Some(&[28, 12][..]));
        assert!(list.genres.is_none());

        let detail: Movie = serde_json::from_str(
            r#"{"id":1,"title":"A","overview":"x","poster_path":"/p.jpg",
                "backdrop_path":null,"release_date":"2020-01-01","vote_average":7.1,
                "genres":[{"id":28,"name":"Action"}],"runtime":120,
                "status":"Released","tagline":"t"}"#,
        )
        .unwrap();
        assert!(detail.genre_ids.is_none());
        assert_eq!(detail.genres.as_ref().map(|g| g[0].id), Some(28));
        assert_eq!(detail.runtime, Some(120));
    }
}
