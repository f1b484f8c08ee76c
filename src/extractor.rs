// src/extractor.rs

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::error::{ExtractError, Operation};
use crate::http::{PageFetcher, PageRequest};
use crate::utils::{collapse_whitespace, decode_entities, first_capture, normalize_duration};

const UNTITLED: &str = "Untitled";

// Playlist tiers: content attribute first, then any .m3u8 URL
static PLAYLIST_TIERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r#"(?i)content="([^"]*\.m3u8)""#).unwrap(),
        Regex::new(r#"(?i)(https?://[^\s"'<>]*\.m3u8)"#).unwrap(),
    ]
});

fn itemprop_tiers(prop: &str) -> Vec<Regex> {
    vec![
        Regex::new(&format!(r#"(?i)itemprop="{prop}"\s+content="([^"]*)""#)).unwrap(),
        Regex::new(&format!(r#"(?i)content="([^"]*)"\s+itemprop="{prop}""#)).unwrap(),
    ]
}

static NAME_TIERS: LazyLock<Vec<Regex>> = LazyLock::new(|| itemprop_tiers("name"));
static THUMBNAIL_TIERS: LazyLock<Vec<Regex>> = LazyLock::new(|| itemprop_tiers("thumbnailUrl"));
static DURATION_TIERS: LazyLock<Vec<Regex>> = LazyLock::new(|| itemprop_tiers("duration"));

/// Playable stream plus the page metadata around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    pub stream_url: String,
    pub title: String,
    pub thumbnail_url: String,
    pub duration: String,
}

/// Absolute, decoded playlist URL found in the page, if any.
///
/// Every match of every tier is tried in order; the first one that decodes to
/// an http(s) URL wins.
pub fn find_playlist_url(html: &str, page_url: &Url) -> Option<String> {
    PLAYLIST_TIERS
        .iter()
        .flat_map(|re| re.captures_iter(html))
        .filter_map(|caps| caps.get(1))
        .find_map(|m| playlist_candidate(m.as_str(), page_url))
}

fn playlist_candidate(raw: &str, page_url: &Url) -> Option<String> {
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    match Url::parse(&decoded) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(decoded),
        Ok(_) => None,
        Err(_) => page_url
            .join(&decoded)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .map(String::from),
    }
}

fn meta_field(tiers: &[Regex], html: &str) -> Option<String> {
    first_capture(tiers, html)
        .map(|v| collapse_whitespace(&decode_entities(&v)))
        .filter(|v| !v.is_empty())
}

/// Extracts a descriptor from an already fetched detail page.
pub fn parse_stream_page(html: &str, page_url: &Url) -> Result<StreamDescriptor, ExtractError> {
    let stream_url = find_playlist_url(html, page_url).ok_or_else(|| ExtractError::StreamNotFound {
        page_url: page_url.to_string(),
    })?;

    Ok(StreamDescriptor {
        stream_url,
        title: meta_field(&NAME_TIERS, html).unwrap_or_else(|| UNTITLED.to_string()),
        thumbnail_url: meta_field(&THUMBNAIL_TIERS, html).unwrap_or_default(),
        duration: meta_field(&DURATION_TIERS, html)
            .map(|d| normalize_duration(&d))
            .unwrap_or_default(),
    })
}

pub fn parse_page_url(page_url: &str) -> Result<Url, ExtractError> {
    let page_url = page_url.trim();
    if page_url.is_empty() {
        return Err(ExtractError::InvalidInput("video page URL is required".into()));
    }

    let url = Url::parse(page_url)
        .map_err(|e| ExtractError::InvalidInput(format!("invalid video page URL '{page_url}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtractError::InvalidInput(format!(
            "video page URL must be http(s): {page_url}"
        )));
    }

    Ok(url)
}

/// Resolves a detail page into its playable stream.
pub struct StreamResolver {
    fetcher: Arc<dyn PageFetcher>,
    settings: Arc<Settings>,
}

impl StreamResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: Arc<Settings>) -> Self {
        Self { fetcher, settings }
    }

    pub async fn resolve_stream(&self, page_url: &str) -> Result<StreamDescriptor, ExtractError> {
        let url = parse_page_url(page_url)?;
        info!(%url, "fetching video page");

        let request = PageRequest::document(page_url.trim(), self.settings.site_referer());
        let html = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|failure| ExtractError::upstream(Operation::ResolveStream, failure))?;

        match parse_stream_page(&html, &url) {
            Ok(stream) => {
                info!(stream_url = %stream.stream_url, "found stream URL");
                Ok(stream)
            }
            Err(err) => {
                warn!(%url, "could not find m3u8 stream URL");
                Err(err)
            }
        }
    }
}
