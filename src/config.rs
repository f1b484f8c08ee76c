use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_ORIGIN: &str = "https://fapnut.net";
const DEFAULT_SOURCE_ID: &str = "video1";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Placeholder replaced by the page number in a source template.
pub const PAGE_PLACEHOLDER: &str = "{page}";

// A logical source ("video1", "video2", ...) and its listing template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub listing_url: String,
}

impl Source {
    pub fn new(id: &str, name: &str, listing_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            listing_url: listing_url.to_string(),
        }
    }

    /// Builds the listing URL for the given page.
    ///
    /// Templates without `{page}` get the number appended.
    pub fn page_url(&self, page: u32) -> String {
        if self.listing_url.contains(PAGE_PLACEHOLDER) {
            self.listing_url.replace(PAGE_PLACEHOLDER, &page.to_string())
        } else {
            format!("{}{}", self.listing_url, page)
        }
    }
}

/// Markers tying the catalog parser to the upstream markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogMarkers {
    /// Repeating container tag delimiting one candidate block.
    pub block_tag: String,
    /// Substring a block must contain to be a real video entry.
    pub video_marker: String,
    pub id_attribute: String,
    pub thumbnail_attribute: String,
    pub duration_class: String,
    pub hd_marker: String,
    /// CSS selectors tried in order for an overriding headline title.
    pub headline_selectors: Vec<String>,
    /// Path fragments marking navigation links rather than videos.
    pub excluded_paths: Vec<String>,
}

impl Default for CatalogMarkers {
    fn default() -> Self {
        Self {
            block_tag: "article".into(),
            video_marker: "data-video-id".into(),
            id_attribute: "data-video-id".into(),
            thumbnail_attribute: "data-main-thumb".into(),
            duration_class: "duration".into(),
            hd_marker: "hd-video".into(),
            headline_selectors: vec![
                "header.entry-header .entry-title".into(),
                "header.entry-header span".into(),
            ],
            excluded_paths: [
                "/category/",
                "/tag/",
                "/page/",
                "/actors/",
                "/categories/",
                "/tags/",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scheme and host of the upstream site, without trailing slash.
    pub origin: String,
    pub default_source: String,
    pub sources: Vec<Source>,
    pub timeout_secs: u64,
    pub markers: CatalogMarkers,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.into(),
            default_source: DEFAULT_SOURCE_ID.into(),
            sources: vec![
                Source::new(
                    "video1",
                    "Latest Videos",
                    &format!("{DEFAULT_ORIGIN}/page/{PAGE_PLACEHOLDER}/"),
                ),
                Source::new(
                    "video2",
                    "OnlyFans",
                    &format!("{DEFAULT_ORIGIN}/category/onlyfans/page/{PAGE_PLACEHOLDER}/"),
                ),
            ],
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            markers: CatalogMarkers::default(),
        }
    }
}

impl Settings {
    // Loads settings: explicit path, then the default config dir, then built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to deserialize settings: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let origin = url::Url::parse(&self.origin)
            .with_context(|| format!("Invalid origin: {}", self.origin))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(anyhow!("Origin must be http(s): {}", self.origin));
        }
        if self.origin.ends_with('/') {
            return Err(anyhow!("Origin must not end with '/': {}", self.origin));
        }

        if self.sources.is_empty() {
            return Err(anyhow!("No sources configured"));
        }
        if !self.sources.iter().any(|s| s.id == self.default_source) {
            return Err(anyhow!(
                "Default source '{}' is not in the source table",
                self.default_source
            ));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be greater than zero"));
        }
        if self.markers.block_tag.trim().is_empty() {
            return Err(anyhow!("markers.block_tag must not be empty"));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Looks up a source, falling back to the default one for unknown ids.
    ///
    /// The flag is `true` when the fallback was taken.
    pub fn source_or_default(&self, id: &str) -> (&Source, bool) {
        if let Some(source) = self.sources.iter().find(|s| s.id == id) {
            return (source, false);
        }

        let fallback = self
            .sources
            .iter()
            .find(|s| s.id == self.default_source)
            .unwrap_or(&self.sources[0]);
        (fallback, true)
    }

    /// Referer accepted by the upstream site for detail pages.
    pub fn site_referer(&self) -> String {
        format!("{}/", self.origin)
    }
}

// Default location of the settings file
pub fn default_config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("vidrust");
    path.push("config.json");
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.sources.len(), 2);
    }

    #[test]
    fn page_url_fills_placeholder() {
        let settings = Settings::default();
        let (source, _) = settings.source_or_default("video2");
        assert_eq!(
            source.page_url(3),
            "https://fapnut.net/category/onlyfans/page/3/"
        );
    }

    #[test]
    fn page_url_appends_without_placeholder() {
        let source = Source::new("x", "X", "https://example.test/page/");
        assert_eq!(source.page_url(7), "https://example.test/page/7");
    }

    #[test]
    fn unknown_source_falls_back_to_default() {
        let settings = Settings::default();
        let (source, fell_back) = settings.source_or_default("nope");
        assert_eq!(source.id, "video1");
        assert!(fell_back);

        let (source, fell_back) = settings.source_or_default("video2");
        assert_eq!(source.id, "video2");
        assert!(!fell_back);
    }

    #[test]
    fn rejects_missing_default_source() {
        let settings = Settings {
            default_source: "video9".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_trailing_slash_origin() {
        let settings = Settings {
            origin: "https://example.test/".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let path = std::env::temp_dir().join(format!("vidrust-config-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{"origin": "https://example.test", "timeout_secs": 5}}"#).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.origin, "https://example.test");
        assert_eq!(settings.timeout_secs, 5);
        assert_eq!(settings.markers, CatalogMarkers::default());
        assert_eq!(settings.default_source, "video1");
    }
}
