use moka::future::Cache;
use std::time::Duration;
use yatube_common::{
    model::{Id, user::UserMarker},
    page::PageRequest,
};

const KEY_PREFIX: &str = "index_page";
const MAX_ENTRIES: u64 = 10_000;

/// Rendered index pages, kept until their time to live runs out.
///
/// Entries are never invalidated by writes, so new posts only show up
/// on the index once the cached page has expired.
#[derive(Clone, Debug)]
pub struct IndexCache(Option<Cache<String, String>>);

impl IndexCache {
    /// `None` disables caching.
    #[must_use]
    pub fn new(time_to_live: Option<Duration>) -> Self {
        Self(time_to_live.map(|ttl| {
            Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build()
        }))
    }

    /// Pages differ per viewer because of the navigation bar.
    #[must_use]
    pub fn key(page: PageRequest, viewer: Option<Id<UserMarker>>) -> String {
        match viewer {
            Some(user_id) => format!("{KEY_PREFIX}:{}:{user_id}", page.number()),
            None => format!("{KEY_PREFIX}:{}:anonymous", page.number()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match &self.0 {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    pub async fn insert(&self, key: String, page: String) {
        if let Some(cache) = &self.0 {
            cache.insert(key, page).await;
        }
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.0 {
            cache.invalidate_all();
        }
    }
}
