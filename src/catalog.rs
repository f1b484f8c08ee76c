use anyhow::{Context, Result, anyhow};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CatalogMarkers, Settings};
use crate::error::{ExtractError, Operation};
use crate::http::{PageFetcher, PageRequest};
use crate::utils::{collapse_whitespace, decode_entities, first_capture, is_fully_decoded, title_from_slug};

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    pub thumbnail_url: String,
    pub title: String,
    pub duration: String,
    pub page_url: String,
    pub is_high_definition: bool,
}

/// A parsed listing page together with the source it was actually read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogPage {
    pub source: String,
    pub page: u32,
    pub videos: Vec<VideoSummary>,
}

/// Why a candidate block produced no summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("no video marker")]
    NotAVideo,
    #[error("missing video id")]
    MissingId,
    #[error("missing thumbnail")]
    MissingThumbnail,
    #[error("missing detail page link")]
    MissingPageUrl,
    #[error("navigation link {0}")]
    NavigationLink(String),
}

/// Patterns compiled once from [`CatalogMarkers`] and the upstream origin.
#[derive(Debug, Clone)]
pub struct CatalogRules {
    block_open: Regex,
    block_close: Regex,
    video_marker: String,
    id: Vec<Regex>,
    thumbnail: Vec<Regex>,
    page_url: Vec<Regex>,
    duration: Vec<Regex>,
    hd_marker: String,
    headline_selectors: Vec<String>,
    excluded_paths: Vec<String>,
}

fn attribute_tiers(name: &str) -> Result<Vec<Regex>> {
    let name = regex::escape(name);
    Ok(vec![
        Regex::new(&format!(r#"(?i){name}\s*=\s*"([^"]+)""#))?,
        Regex::new(&format!(r#"(?i){name}\s*=\s*'([^']+)'"#))?,
    ])
}

impl CatalogRules {
    pub fn compile(markers: &CatalogMarkers, origin: &str) -> Result<Self> {
        let tag = regex::escape(markers.block_tag.trim());
        let origin = regex::escape(origin);
        let class = regex::escape(&markers.duration_class);

        for selector in &markers.headline_selectors {
            Selector::parse(selector)
                .map_err(|e| anyhow!("Invalid headline selector '{}': {:?}", selector, e))?;
        }

        Ok(Self {
            block_open: Regex::new(&format!(r"(?i)<{tag}\b"))?,
            block_close: Regex::new(&format!(r"(?i)</{tag}\s*>"))?,
            video_marker: markers.video_marker.clone(),
            id: attribute_tiers(&markers.id_attribute).context("id attribute pattern")?,
            thumbnail: attribute_tiers(&markers.thumbnail_attribute)
                .context("thumbnail attribute pattern")?,
            page_url: vec![
                Regex::new(&format!(r#"(?i)<a\s+href="({origin}/[^"]+/)""#))?,
                Regex::new(&format!(r#"(?i)<a\s[^>]*?href=["']({origin}/[^"']+/)["']"#))?,
            ],
            duration: vec![
                Regex::new(&format!(
                    r#"(?i)<span class="{class}">[^<]*<i[^>]*></i>\s*([^<]*)</span>"#
                ))?,
                Regex::new(&format!(r#"(?is)<span class="{class}">.*?</i>\s*([^<]*)</span>"#))?,
                Regex::new(&format!(
                    r#"(?is)<span[^>]*class="[^"]*\b{class}\b[^"]*"[^>]*>\s*([^<]*?)\s*</span>"#
                ))?,
            ],
            hd_marker: markers.hd_marker.clone(),
            headline_selectors: markers.headline_selectors.clone(),
            excluded_paths: markers.excluded_paths.clone(),
        })
    }

    /// Splits a listing body into candidate blocks, in document order.
    ///
    /// A block runs from its opening tag to the first closing tag, and never
    /// past the next opening tag.
    pub fn candidate_blocks<'h>(&self, html: &'h str) -> Vec<&'h str> {
        let starts: Vec<usize> = self.block_open.find_iter(html).map(|m| m.start()).collect();

        starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(html.len());
                let segment = &html[start..end];
                match self.block_close.find(segment) {
                    Some(close) => &segment[..close.end()],
                    None => segment,
                }
            })
            .collect()
    }

    fn is_navigation(&self, url: &str) -> bool {
        url.contains('?') || self.excluded_paths.iter().any(|p| url.contains(p.as_str()))
    }

    fn headline(&self, block: &str) -> Option<String> {
        let fragment = Html::parse_fragment(block);

        self.headline_selectors.iter().find_map(|raw| {
            let selector = Selector::parse(raw).ok()?;
            let text: String = fragment.select(&selector).next()?.text().collect();
            let title = collapse_whitespace(&decode_entities(&text));
            (!title.is_empty() && is_fully_decoded(&title)).then_some(title)
        })
    }

    /// Validates one candidate block into a summary.
    pub fn parse_block(&self, block: &str) -> Result<VideoSummary, SkipReason> {
        if !block.contains(self.video_marker.as_str()) {
            return Err(SkipReason::NotAVideo);
        }

        let id = first_capture(&self.id, block)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(SkipReason::MissingId)?;

        let thumbnail_url = first_capture(&self.thumbnail, block)
            .map(|v| decode_entities(v.trim()))
            .filter(|v| !v.is_empty())
            .ok_or(SkipReason::MissingThumbnail)?;

        let page_url = first_capture(&self.page_url, block).ok_or(SkipReason::MissingPageUrl)?;
        if self.is_navigation(&page_url) {
            return Err(SkipReason::NavigationLink(page_url));
        }

        let duration = first_capture(&self.duration, block)
            .map(|d| collapse_whitespace(&decode_entities(&d)))
            .unwrap_or_default();

        let is_high_definition = !self.hd_marker.is_empty() && block.contains(self.hd_marker.as_str());

        let title = self
            .headline(block)
            .unwrap_or_else(|| decode_entities(&title_from_slug(&page_url)));

        Ok(VideoSummary {
            id,
            thumbnail_url,
            title,
            duration,
            page_url,
            is_high_definition,
        })
    }

    /// Parses a whole listing page, keeping only validated entries.
    pub fn parse_listing(&self, html: &str) -> Vec<VideoSummary> {
        let blocks = self.candidate_blocks(html);
        if blocks.is_empty() {
            debug!("no candidate blocks in listing body");
        }

        let mut seen = HashSet::new();
        let videos = blocks
            .into_iter()
            .enumerate()
            .fold(Vec::new(), |mut acc, (index, block)| {
                match self.parse_block(block) {
                    Ok(video) if seen.insert(video.id.clone()) => acc.push(video),
                    Ok(video) => debug!(index, id = %video.id, "duplicate video id, skipping"),
                    Err(reason) => debug!(index, %reason, "skipping candidate block"),
                }
                acc
            });

        info!(count = videos.len(), "parsed valid videos");
        videos
    }
}

/// Lists one page of a configured source.
pub struct CatalogExtractor {
    fetcher: Arc<dyn PageFetcher>,
    settings: Arc<Settings>,
    rules: CatalogRules,
}

impl CatalogExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: Arc<Settings>) -> Result<Self> {
        settings.validate()?;
        let rules = CatalogRules::compile(&settings.markers, &settings.origin)?;
        Ok(Self {
            fetcher,
            settings,
            rules,
        })
    }

    pub fn rules(&self) -> &CatalogRules {
        &self.rules
    }

    pub async fn list_videos(&self, source_id: &str, page: u32) -> Result<Vec<VideoSummary>, ExtractError> {
        Ok(self.list_page(source_id, page).await?.videos)
    }

    pub async fn list_page(&self, source_id: &str, page: u32) -> Result<CatalogPage, ExtractError> {
        if page == 0 {
            return Err(ExtractError::InvalidInput("page must be at least 1".into()));
        }

        let (source, fell_back) = self.settings.source_or_default(source_id);
        if fell_back {
            warn!(requested = source_id, using = %source.id, "unknown source, using default");
        }

        let url = source.page_url(page);
        let referer = source.page_url(page.saturating_sub(1).max(1));
        info!(source = %source.id, page, %url, "fetching videos");

        let html = self
            .fetcher
            .fetch(&PageRequest::listing(url, referer))
            .await
            .map_err(|failure| ExtractError::upstream(Operation::ListVideos, failure))?;

        Ok(CatalogPage {
            source: source.id.clone(),
            page,
            videos: self.rules.parse_listing(&html),
        })
    }
}
