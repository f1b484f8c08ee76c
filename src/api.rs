use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use crate::catalog::{CatalogExtractor, VideoSummary};
use crate::config::{Settings, Source};
use crate::error::{ErrorKind, ExtractError};
use crate::extractor::{StreamDescriptor, StreamResolver};
use crate::http::PageFetcher;

/// Incoming request envelope. `source` and `videoUrl` are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    ListVideos {
        #[serde(default, alias = "source")]
        source_id: Option<String>,
        #[serde(default, deserialize_with = "lenient_page")]
        page: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    ResolveStream {
        #[serde(default, alias = "videoUrl")]
        page_url: Option<String>,
    },
}

// Numbers or numeric strings; anything unusable becomes None and later page 1
fn lenient_page<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let page = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 1.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    Ok(page.and_then(|p| u32::try_from(p).ok()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Videos {
        success: bool,
        videos: Vec<VideoSummary>,
        page: u32,
        source: String,
    },
    Stream {
        success: bool,
        #[serde(flatten)]
        stream: StreamDescriptor,
    },
    Failure {
        success: bool,
        error: String,
        kind: ErrorKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

impl Response {
    pub fn failure(err: &ExtractError) -> Self {
        Self::Failure {
            success: false,
            error: err.to_string(),
            kind: err.kind(),
            status: err.status_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }
}

/// Routes requests to the two extractors.
pub struct Dispatcher {
    settings: Arc<Settings>,
    catalog: CatalogExtractor,
    resolver: StreamResolver,
}

impl Dispatcher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: Arc<Settings>) -> anyhow::Result<Self> {
        Ok(Self {
            catalog: CatalogExtractor::new(fetcher.clone(), settings.clone())?,
            resolver: StreamResolver::new(fetcher, settings.clone()),
            settings,
        })
    }

    pub fn catalog(&self) -> &CatalogExtractor {
        &self.catalog
    }

    pub fn resolver(&self) -> &StreamResolver {
        &self.resolver
    }

    pub fn sources(&self) -> &[Source] {
        &self.settings.sources
    }

    pub async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::ListVideos { source_id, page } => {
                // Missing or zero page becomes 1
                let page = page.filter(|p| *p >= 1).unwrap_or(1);
                let source_id = source_id.unwrap_or_else(|| self.settings.default_source.clone());

                self.catalog
                    .list_page(&source_id, page)
                    .await
                    .map(|listing| Response::Videos {
                        success: true,
                        videos: listing.videos,
                        page: listing.page,
                        source: listing.source,
                    })
            }
            Request::ResolveStream { page_url } => {
                let page_url = page_url.unwrap_or_default();
                self.resolver
                    .resolve_stream(&page_url)
                    .await
                    .map(|stream| Response::Stream {
                        success: true,
                        stream,
                    })
            }
        };

        result.unwrap_or_else(|err| {
            error!(kind = ?err.kind(), status = ?err.status_code(), "{err}");
            Response::failure(&err)
        })
    }

    /// JSON in, JSON out. Malformed bodies are reported as invalid input.
    pub async fn handle_json(&self, body: &str) -> String {
        let response = match serde_json::from_str::<Request>(body) {
            Ok(request) => self.handle(request).await,
            Err(e) => Response::failure(&ExtractError::InvalidInput(format!("malformed request: {e}"))),
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"error":"failed to encode response: {e}","kind":"InvalidInputError"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_aliases() {
        let req: Request = serde_json::from_str(r#"{"action":"listVideos","source":"video2","page":3}"#).unwrap();
        assert_eq!(
            req,
            Request::ListVideos {
                source_id: Some("video2".into()),
                page: Some(3)
            }
        );

        let req: Request =
            serde_json::from_str(r#"{"action":"resolveStream","videoUrl":"https://example.test/a/"}"#).unwrap();
        assert_eq!(
            req,
            Request::ResolveStream {
                page_url: Some("https://example.test/a/".into())
            }
        );

        let req: Request = serde_json::from_str(r#"{"action":"listVideos"}"#).unwrap();
        assert_eq!(
            req,
            Request::ListVideos {
                source_id: None,
                page: None
            }
        );
    }

    #[test]
    fn page_is_coerced_leniently() {
        let page_of = |body: &str| match serde_json::from_str::<Request>(body).unwrap() {
            Request::ListVideos { page, .. } => page,
            other => panic!("unexpected request: {other:?}"),
        };

        assert_eq!(page_of(r#"{"action":"listVideos","page":"2"}"#), Some(2));
        assert_eq!(page_of(r#"{"action":"listVideos","page":" 7 "}"#), Some(7));
        assert_eq!(page_of(r#"{"action":"listVideos","page":3.0}"#), Some(3));
        assert_eq!(page_of(r#"{"action":"listVideos","page":-1}"#), None);
        assert_eq!(page_of(r#"{"action":"listVideos","page":"abc"}"#), None);
        assert_eq!(page_of(r#"{"action":"listVideos","page":null}"#), None);
        assert_eq!(page_of(r#"{"action":"listVideos","page":99999999999}"#), None);
    }

    #[test]
    fn failure_envelope() {
        let err = ExtractError::upstream(
            crate::error::Operation::ListVideos,
            crate::error::FetchFailure::Status(403),
        );
        let json = serde_json::to_value(Response::failure(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "UpstreamFetchError");
        assert_eq!(json["status"], 403);

        let err = ExtractError::InvalidInput("x".into());
        let json = serde_json::to_value(Response::failure(&err)).unwrap();
        assert!(json.get("status").is_none());
    }

    #[test]
    fn stream_envelope_is_flat() {
        let response = Response::Stream {
            success: true,
            stream: StreamDescriptor {
                stream_url: "https://cdn.example/m.m3u8".into(),
                title: "t".into(),
                thumbnail_url: "".into(),
                duration: "".into(),
            },
        };
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["streamUrl"], "https://cdn.example/m.m3u8");
    }
}
