//! Remote catalog lookups (MangaDex)
//!
//! Search results and volume/chapter bounds only populate the caller's
//! selection UI; nothing in the job pipeline depends on this module.

use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;
use utoipa::ToSchema;

/// One search hit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CatalogEntry {
    /// Catalog identifier, usable as a `catalog` content source
    pub id: String,
    /// Display title
    pub title: String,
    /// Cover thumbnail URL, if the catalog has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

/// Known bounds of a title in one language
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CatalogDetails {
    /// Catalog identifier
    pub id: String,
    /// Language the bounds were computed for
    pub language: String,
    /// Highest numbered volume
    pub max_volume: Option<u32>,
    /// Highest chapter number (chapters may be fractional)
    pub max_chapter: Option<f64>,
    /// Number of chapters not assigned to any volume
    pub unassigned_chapters: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<MangaData>,
}

#[derive(Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: HashMap<String, String>,
    #[serde(default, rename = "altTitles")]
    alt_titles: Vec<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Option<RelationshipAttributes>,
}

#[derive(Deserialize)]
struct RelationshipAttributes {
    #[serde(default, rename = "fileName")]
    file_name: Option<String>,
}

#[derive(Deserialize)]
struct AggregateResponse {
    /// An object keyed by volume, or an empty array when there is nothing
    #[serde(default)]
    volumes: Value,
}

/// HTTP client for the catalog API
#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    cover_base_url: String,
    search_limit: u32,
}

impl CatalogClient {
    /// Build a client from configuration
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("panelpress/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cover_base_url: config.cover_base_url.trim_end_matches('/').to_string(),
            search_limit: config.search_limit,
        })
    }

    /// Search titles by free text
    pub async fn search(&self, title: &str) -> Result<Vec<CatalogEntry>> {
        let url = format!("{}/manga", self.base_url);
        let limit = self.search_limit.to_string();
        debug!(%url, title, "catalog search");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("title", title),
                ("limit", limit.as_str()),
                ("includes[]", "cover_art"),
            ])
            .send()
            .await?;
        let body: SearchResponse = Self::json(response).await?;

        Ok(body
            .data
            .into_iter()
            .map(|manga| {
                let title = pick_title(&manga.attributes).unwrap_or_else(|| manga.id.clone());
                let cover_url = manga
                    .relationships
                    .iter()
                    .filter(|r| r.kind == "cover_art")
                    .find_map(|r| r.attributes.as_ref()?.file_name.clone())
                    .map(|file| format!("{}/{}/{}.256.jpg", self.cover_base_url, manga.id, file));
                CatalogEntry {
                    id: manga.id,
                    title,
                    cover_url,
                }
            })
            .collect())
    }

    /// Volume and chapter bounds of a title in `language`
    pub async fn details(&self, id: &str, language: &str) -> Result<CatalogDetails> {
        if !crate::types::is_catalog_id(id) {
            return Err(Error::InvalidRequest(format!("malformed catalog id: {}", id)));
        }
        let url = format!("{}/manga/{}/aggregate", self.base_url, id);
        debug!(%url, language, "catalog aggregate");

        let response = self
            .client
            .get(&url)
            .query(&[("translatedLanguage[]", language)])
            .send()
            .await?;
        let body: AggregateResponse = Self::json(response).await?;

        let mut details = CatalogDetails {
            id: id.to_string(),
            language: language.to_string(),
            max_volume: None,
            max_chapter: None,
            unassigned_chapters: 0,
        };
        let Value::Object(volumes) = body.volumes else {
            return Ok(details);
        };

        for (key, volume) in &volumes {
            let chapters = volume.get("chapters");
            let chapter_numbers = chapters
                .and_then(Value::as_object)
                .map(|c| c.keys().filter_map(|k| k.parse::<f64>().ok()).collect::<Vec<_>>())
                .unwrap_or_default();

            match key.parse::<u32>() {
                Ok(number) => details.max_volume = details.max_volume.max(Some(number)),
                Err(_) => {
                    details.unassigned_chapters +=
                        chapters.and_then(Value::as_object).map_or(0, |c| c.len())
                }
            }
            for chapter in chapter_numbers {
                if details.max_chapter.is_none_or(|max| chapter > max) {
                    details.max_chapter = Some(chapter);
                }
            }
        }
        Ok(details)
    }

    async fn json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Catalog(format!(
                "catalog responded {} for {}",
                status,
                response.url()
            )));
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// English title first, then any title, then an English alternative
fn pick_title(attributes: &MangaAttributes) -> Option<String> {
    attributes
        .title
        .get("en")
        .or_else(|| attributes.title.values().next())
        .or_else(|| attributes.alt_titles.iter().find_map(|alt| alt.get("en")))
        .cloned()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CatalogClient {
        CatalogClient::new(&CatalogConfig {
            base_url: server.uri(),
            cover_base_url: "https://covers.test".into(),
            timeout: Duration::from_secs(5),
            search_limit: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn search_maps_titles_and_covers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manga"))
            .and(query_param("title", "berserk"))
            .and(query_param("limit", "5"))
            .and(query_param("includes[]", "cover_art"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "ok",
                "data": [
                    {
                        "id": "801513ba",
                        "attributes": { "title": { "en": "Berserk" } },
                        "relationships": [
                            { "type": "author", "id": "x" },
                            { "type": "cover_art", "attributes": { "fileName": "c1.jpg" } }
                        ]
                    },
                    {
                        "id": "aa11",
                        "attributes": {
                            "title": { "ja-ro": "Beruseruku" },
                            "altTitles": [{ "en": "Unused" }]
                        }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let hits = client_for(&server).search("berserk").await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Berserk");
        assert_eq!(
            hits[0].cover_url.as_deref(),
            Some("https://covers.test/801513ba/c1.jpg.256.jpg")
        );
        assert_eq!(hits[1].title, "Beruseruku");
        assert!(hits[1].cover_url.is_none());
    }

    #[tokio::test]
    async fn details_compute_maximum_volume_and_chapter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manga/abc/aggregate"))
            .and(query_param("translatedLanguage[]", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "ok",
                "volumes": {
                    "none": { "volume": "none", "chapters": { "120": {}, "121.5": {} } },
                    "2": { "volume": "2", "chapters": { "9": {}, "10": {} } },
                    "10": { "volume": "10", "chapters": { "100": {} } }
                }
            })))
            .mount(&server)
            .await;

        let details = client_for(&server).details("abc", "en").await.unwrap();

        assert_eq!(details.max_volume, Some(10));
        assert_eq!(details.max_chapter, Some(121.5));
        assert_eq!(details.unassigned_chapters, 2);
    }

    #[tokio::test]
    async fn empty_aggregate_has_no_bounds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manga/empty/aggregate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "result": "ok", "volumes": [] })),
            )
            .mount(&server)
            .await;

        let details = client_for(&server).details("empty", "fr").await.unwrap();
        assert_eq!(details.max_volume, None);
        assert_eq!(details.max_chapter, None);
        assert_eq!(details.language, "fr");
    }

    #[tokio::test]
    async fn error_status_is_a_catalog_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manga/missing/aggregate"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).details("missing", "en").await.unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[tokio::test]
    async fn malformed_id_never_reaches_the_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server).details("../users", "en").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn unreachable_catalog_is_a_network_error() {
        let client = CatalogClient::new(&CatalogConfig {
            base_url: "http://127.0.0.1:1".into(),
            cover_base_url: "https://covers.test".into(),
            timeout: Duration::from_secs(2),
            search_limit: 5,
        })
        .unwrap();
        assert!(matches!(client.search("x").await, Err(Error::Network(_))));
    }
}
