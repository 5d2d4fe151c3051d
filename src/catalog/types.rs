//! Catalog and item types shared by the source adapter and the crawler

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a selected catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogType {
    Movie,
    Series,
    /// Catalog whose items may be movies or series
    Mixed,
}

impl CatalogType {
    /// Parses the type name used in configuration files
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "series" => Some(Self::Series),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }

    /// Normalizes a type reported by an addon manifest
    ///
    /// Returns None for live-TV types, which are never prefetched. Any other
    /// unknown type (including the legacy "all") is treated as mixed.
    pub fn from_manifest_str(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "series" => Some(Self::Series),
            "tv" | "channel" => None,
            _ => Some(Self::Mixed),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for CatalogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of a single content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Movie,
    Series,
    Episode,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Episode => "episode",
        }
    }

    /// Path segment used by the stream endpoint
    pub fn stream_path(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series | Self::Episode => "series",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of content discovered in a catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Stable external id; for episodes this is the parent series id
    pub external_id: String,
    pub item_type: ItemType,
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl Item {
    pub fn movie(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            item_type: ItemType::Movie,
            title: title.into(),
            season: None,
            episode: None,
        }
    }

    pub fn series(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            item_type: ItemType::Series,
            title: title.into(),
            season: None,
            episode: None,
        }
    }

    pub fn episode(
        series_id: impl Into<String>,
        title: impl Into<String>,
        season: u32,
        episode: u32,
    ) -> Self {
        Self {
            external_id: series_id.into(),
            item_type: ItemType::Episode,
            title: title.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    /// Freshness cache key, unique per type and id
    ///
    /// Episodes include season and episode so each one is tracked separately.
    pub fn key(&self) -> String {
        match (self.item_type, self.season, self.episode) {
            (ItemType::Episode, Some(s), Some(e)) => {
                format!("episode:{}:{}:{}", self.external_id, s, e)
            }
            (kind, _, _) => format!("{}:{}", kind, self.external_id),
        }
    }

    /// Id passed to the stream endpoint
    pub fn stream_id(&self) -> String {
        match (self.item_type, self.season, self.episode) {
            (ItemType::Episode, Some(s), Some(e)) => format!("{}:{}:{}", self.external_id, s, e),
            _ => self.external_id.clone(),
        }
    }
}

/// A catalog chosen for crawling, as configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSelection {
    /// Catalog addon base URL, without trailing slash
    pub addon_url: String,
    pub catalog_id: String,
    pub catalog_type: CatalogType,
    pub enabled: bool,
    pub order: u32,
    pub name: String,
}

/// A catalog as advertised by an addon manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDescriptor {
    pub id: String,
    pub name: String,
    /// None for live-TV catalogs
    pub catalog_type: Option<CatalogType>,
    /// The catalog can only be queried with a search term
    pub search_only: bool,
}

impl CatalogDescriptor {
    /// Whether the catalog can be paged without user input
    pub fn is_prefetchable(&self) -> bool {
        self.catalog_type.is_some() && !self.search_only
    }
}

/// One page of catalog items
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub items: Vec<Item>,
    /// Entries the addon returned, including ones dropped as malformed
    pub fetched: usize,
    pub has_more: bool,
}

impl CatalogPage {
    /// A page whose items were all usable
    pub fn new(items: Vec<Item>, has_more: bool) -> Self {
        Self {
            fetched: items.len(),
            items,
            has_more,
        }
    }
}

/// A stream returned for an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub name: String,
    pub description: String,
    /// Playback URL; None for streams that cannot be probed
    pub url: Option<String>,
}

impl StreamInfo {
    /// Text the cached-stream pattern is matched against
    pub fn match_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.description,
            self.url.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_keys() {
        assert_eq!(Item::movie("tt1", "A").key(), "movie:tt1");
        assert_eq!(Item::series("tt2", "B").key(), "series:tt2");
        assert_eq!(Item::episode("tt2", "B", 1, 3).key(), "episode:tt2:1:3");
    }

    #[test]
    fn test_stream_ids() {
        assert_eq!(Item::movie("tt1", "A").stream_id(), "tt1");
        assert_eq!(Item::episode("tt2", "B", 2, 10).stream_id(), "tt2:2:10");
        assert_eq!(ItemType::Episode.stream_path(), "series");
    }

    #[test]
    fn test_manifest_types() {
        assert_eq!(CatalogType::from_manifest_str("movie"), Some(CatalogType::Movie));
        assert_eq!(CatalogType::from_manifest_str("all"), Some(CatalogType::Mixed));
        assert_eq!(CatalogType::from_manifest_str("anime"), Some(CatalogType::Mixed));
        assert_eq!(CatalogType::from_manifest_str("tv"), None);
        assert_eq!(CatalogType::from_manifest_str("channel"), None);
        assert_eq!(CatalogType::from_config_str("all"), None);
    }

    #[test]
    fn test_descriptor_prefetchable() {
        let mut d = CatalogDescriptor {
            id: "top".to_string(),
            name: "Top".to_string(),
            catalog_type: Some(CatalogType::Movie),
            search_only: false,
        };
        assert!(d.is_prefetchable());
        d.search_only = true;
        assert!(!d.is_prefetchable());
        d.search_only = false;
        d.catalog_type = None;
        assert!(!d.is_prefetchable());
    }

    #[test]
    fn test_stream_match_text() {
        let stream = StreamInfo {
            name: "[RD+] Source".to_string(),
            description: "1080p".to_string(),
            url: Some("https://cdn.example.com/a".to_string()),
        };
        assert_eq!(
            stream.match_text(),
            "[RD+] Source 1080p https://cdn.example.com/a"
        );
    }
}
