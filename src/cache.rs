use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use sha2::{Digest, Sha256};

use crate::Svg;
use crate::types::Color;

struct CacheEntry {
    svg: Weak<Svg>,
    override_color: Option<Color>,
}

/// Soft document cache keyed by the source digest. Entries hold weak
/// references, so the cache never keeps a parsed document alive on its
/// own. A cached entry is only reusable when its recorded override color
/// matches the request; a mismatch reads as a miss and the caller parses
/// fresh.
pub(crate) struct PictureCache {
    entries: Mutex<HashMap<[u8; 32], CacheEntry>>,
}

impl PictureCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn key(source: &str) -> [u8; 32] {
        Sha256::digest(source.as_bytes()).into()
    }

    pub fn get(&self, key: &[u8; 32], override_color: Option<Color>) -> Option<Arc<Svg>> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if entry.override_color != override_color {
            return None;
        }
        entry.svg.upgrade()
    }

    pub fn insert(&self, key: [u8; 32], override_color: Option<Color>, svg: &Arc<Svg>) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.retain(|_, entry| entry.svg.strong_count() > 0);
        entries.insert(
            key,
            CacheEntry {
                svg: Arc::downgrade(svg),
                override_color,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_svg() -> Arc<Svg> {
        Arc::new(crate::parse_svg(r#"<svg width="1" height="1"></svg>"#).unwrap())
    }

    #[test]
    fn hit_requires_matching_override() {
        let cache = PictureCache::new();
        let key = PictureCache::key("<svg/>");
        let svg = empty_svg();
        cache.insert(key, None, &svg);

        assert!(cache.get(&key, None).is_some());
        assert!(cache.get(&key, Some(Color::BLACK)).is_none());
    }

    #[test]
    fn dropped_documents_are_not_retained() {
        let cache = PictureCache::new();
        let key = PictureCache::key("<svg/>");
        let svg = empty_svg();
        cache.insert(key, None, &svg);
        drop(svg);
        assert!(cache.get(&key, None).is_none());
    }

    #[test]
    fn distinct_sources_have_distinct_keys() {
        assert_ne!(PictureCache::key("<svg/>"), PictureCache::key("<svg />"));
    }
}
