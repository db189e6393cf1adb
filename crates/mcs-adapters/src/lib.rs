//! Record source contracts + the Sketchfab catalog source.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mcs_core::{Category, License, Record, RecordOwner, Tag};
use mcs_storage::{FetchError, HttpClientConfig, HttpFetcher};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::info;

pub const CRATE_NAME: &str = "mcs-adapters";

pub const DEFAULT_SKETCHFAB_BASE_URL: &str = "https://api.sketchfab.com/v3";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("decoding {origin}: {source}")]
    Decode {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies one ordered batch of records per call.
///
/// No pagination state survives between calls; a source that needs several
/// pages must combine them before returning.
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn source_id(&self) -> &'static str;

    async fn fetch_batch(&self) -> Result<Vec<Record>, SourceError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiCursors {
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// Response envelope of `GET /models`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub cursors: ApiCursors,
    pub next: Option<String>,
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<ApiModel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiTag {
    pub name: String,
    pub slug: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiCategory {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiUser {
    pub uid: String,
    pub username: String,
    pub display_name: String,
    pub profile_url: Option<String>,
    pub account: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiLicense {
    pub uid: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiModel {
    pub uri: String,
    pub uid: String,
    pub name: String,
    #[serde(rename = "staffpickedAt")]
    pub staff_picked_at: Option<String>,
    pub view_count: u64,
    pub like_count: u64,
    pub animation_count: u64,
    pub viewer_url: String,
    pub embed_url: String,
    pub comment_count: u64,
    pub is_downloadable: bool,
    pub published_at: Option<String>,
    pub tags: Vec<ApiTag>,
    pub categories: Vec<ApiCategory>,
    pub thumbnails: JsonValue,
    pub user: Option<ApiUser>,
    pub description: String,
    pub face_count: u64,
    pub created_at: Option<String>,
    pub vertex_count: u64,
    pub is_age_restricted: bool,
    pub sound_count: u64,
    pub is_protected: bool,
    pub license: Option<ApiLicense>,
    pub price: Option<f64>,
    pub archives: JsonValue,
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl ApiModel {
    /// Auxiliary attributes kept verbatim alongside the record.
    fn extra(&self) -> Map<String, JsonValue> {
        let mut extra = Map::new();
        extra.insert("thumbnails".into(), self.thumbnails.clone());
        extra.insert("archives".into(), self.archives.clone());
        extra.insert("viewerUrl".into(), JsonValue::from(self.viewer_url.clone()));
        extra.insert("embedUrl".into(), JsonValue::from(self.embed_url.clone()));
        extra.insert("commentCount".into(), JsonValue::from(self.comment_count));
        extra.insert("animationCount".into(), JsonValue::from(self.animation_count));
        extra.insert("faceCount".into(), JsonValue::from(self.face_count));
        extra.insert("vertexCount".into(), JsonValue::from(self.vertex_count));
        extra.insert("soundCount".into(), JsonValue::from(self.sound_count));
        extra.insert("isAgeRestricted".into(), JsonValue::from(self.is_age_restricted));
        extra.insert("isProtected".into(), JsonValue::from(self.is_protected));
        extra.insert("price".into(), JsonValue::from(self.price));
        extra.insert("staffpickedAt".into(), JsonValue::from(self.staff_picked_at.clone()));
        extra
    }

    pub fn into_record(self) -> Record {
        let extra = self.extra();
        Record {
            source_created_at: parse_timestamp(self.created_at.as_deref()),
            last_modified_at: parse_timestamp(self.published_at.as_deref()),
            id: self.uid,
            name: self.name,
            description: self.description,
            uri: self.uri,
            owner: self.user.map(|u| RecordOwner {
                uid: u.uid,
                username: u.username,
                display_name: u.display_name,
                profile_url: u.profile_url,
                account: u.account,
                uri: u.uri,
            }),
            license: self.license.map(|l| License {
                uid: l.uid,
                label: l.label,
            }),
            tags: self
                .tags
                .into_iter()
                .map(|t| Tag {
                    name: t.name,
                    slug: t.slug,
                    uri: t.uri,
                })
                .collect(),
            categories: self
                .categories
                .into_iter()
                .map(|c| Category { name: c.name })
                .collect(),
            view_count: self.view_count,
            like_count: self.like_count,
            is_downloadable: self.is_downloadable,
            extra,
        }
    }
}

pub fn decode_models_response(origin: &str, bytes: &[u8]) -> Result<Vec<Record>, SourceError> {
    let response: ModelsResponse =
        serde_json::from_slice(bytes).map_err(|source| SourceError::Decode {
            origin: origin.to_string(),
            source,
        })?;
    Ok(response
        .results
        .into_iter()
        .map(ApiModel::into_record)
        .collect())
}

#[derive(Debug, Clone)]
pub struct SketchfabSourceConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for SketchfabSourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SKETCHFAB_BASE_URL.to_string(),
            user_agent: "model-catalog-sync/0.1".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Fetches the first page of downloadable models from the Sketchfab API.
#[derive(Debug)]
pub struct SketchfabSource {
    base_url: String,
    http: HttpFetcher,
}

impl SketchfabSource {
    pub fn new(config: SketchfabSourceConfig) -> anyhow::Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: config.timeout,
            user_agent: Some(config.user_agent),
            ..Default::default()
        })?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }
}

#[async_trait]
impl RecordSource for SketchfabSource {
    fn source_id(&self) -> &'static str {
        "sketchfab"
    }

    async fn fetch_batch(&self) -> Result<Vec<Record>, SourceError> {
        let url = self.models_url();
        let response = self
            .http
            .fetch_json_bytes(
                self.source_id(),
                &url,
                &[("downloadable", "true"), ("archives_flavours", "false")],
            )
            .await?;
        let records = decode_models_response(&response.final_url, &response.body)?;
        info!(records = records.len(), url = %response.final_url, "decoded downloadable models");
        Ok(records)
    }
}

/// Reads a saved `GET /models` response from disk.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    path: PathBuf,
}

impl FixtureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for FixtureSource {
    fn source_id(&self) -> &'static str {
        "fixture"
    }

    async fn fetch_batch(&self) -> Result<Vec<Record>, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        decode_models_response(&self.path.display().to_string(), &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
        "cursors": {"next": "24", "previous": null},
        "next": "https://api.sketchfab.com/v3/models?cursor=24",
        "previous": null,
        "results": [{
            "uri": "https://api.sketchfab.com/v3/models/abc",
            "uid": "abc",
            "name": "Old Lantern",
            "staffpickedAt": null,
            "viewCount": 120,
            "likeCount": 7,
            "animationCount": 0,
            "viewerUrl": "https://sketchfab.com/3d-models/old-lantern-abc",
            "embedUrl": "https://sketchfab.com/models/abc/embed",
            "commentCount": 2,
            "isDownloadable": true,
            "publishedAt": "2024-02-03T10:00:00.123456",
            "tags": [{"name": "lantern", "slug": "lantern", "uri": "https://api.sketchfab.com/v3/tags/lantern"}],
            "categories": [{"name": "Furniture & Home"}],
            "thumbnails": {"images": []},
            "user": {"uid": "u1", "username": "maker", "displayName": "Maker", "profileUrl": null, "account": "basic", "uri": "https://api.sketchfab.com/v3/users/u1"},
            "description": "A lantern.",
            "faceCount": 5400,
            "createdAt": "2024-02-01T08:30:00Z",
            "vertexCount": 2800,
            "isAgeRestricted": false,
            "soundCount": 0,
            "isProtected": false,
            "license": {"uid": "l1", "label": "CC Attribution"},
            "price": null,
            "archives": {"glb": {"size": 1024, "type": "glb"}}
        }]
    }"#;

    #[test]
    fn decodes_api_model_into_record() {
        let records = decode_models_response("inline", SAMPLE.as_bytes()).expect("decode");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "abc");
        assert_eq!(record.name, "Old Lantern");
        assert_eq!(record.view_count, 120);
        assert_eq!(record.like_count, 7);
        assert!(record.is_downloadable);
        assert_eq!(record.tags.len(), 1);
        assert_eq!(record.categories[0].name, "Furniture & Home");
        assert_eq!(record.owner.as_ref().map(|o| o.username.as_str()), Some("maker"));
        assert_eq!(record.license.as_ref().map(|l| l.label.as_str()), Some("CC Attribution"));
        assert_eq!(
            record.source_created_at,
            Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).single()
        );
        assert_eq!(record.extra["faceCount"], 5400);
        assert_eq!(record.extra["archives"]["glb"]["size"], 1024);
    }

    #[test]
    fn unparseable_timestamps_become_none() {
        // publishedAt above carries no offset, which RFC 3339 rejects.
        let records = decode_models_response("inline", SAMPLE.as_bytes()).expect("decode");
        assert_eq!(records[0].last_modified_at, None);
    }

    #[test]
    fn missing_optional_sections_decode_with_defaults() {
        let records = decode_models_response(
            "inline",
            br#"{"results": [{"uid": "bare", "name": "Bare"}]}"#,
        )
        .expect("decode");
        assert_eq!(records[0].id, "bare");
        assert!(records[0].owner.is_none());
        assert!(records[0].tags.is_empty());
        assert_eq!(records[0].view_count, 0);
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let err = decode_models_response("inline", b"<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }));
    }

    #[test]
    fn models_url_strips_trailing_slash() {
        let source = SketchfabSource::new(SketchfabSourceConfig {
            base_url: "http://localhost:9999/v3/".into(),
            ..Default::default()
        })
        .expect("source");
        assert_eq!(source.models_url(), "http://localhost:9999/v3/models");
        assert_eq!(source.source_id(), "sketchfab");
    }
}
