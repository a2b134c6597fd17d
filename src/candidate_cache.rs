//! The boundary to whatever supplies catalog releases, plus an explicit cache in front of it.
//!
//! Lookups are keyed by the canonical forms of the artist and album hints, so `IU - Palette` and
//! `iu - PALETTE` share an entry. Entries expire after a fixed time to live, and once the cache is
//! full the oldest entry makes room for the newest.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidates::CandidateRelease;
use crate::error::{Result, RoseError};
use crate::names;

pub const DEFAULT_CACHE_TTL_SECS: i64 = 60 * 60;
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateQuery {
    artist: String,
    album: String,
}

impl CandidateQuery {
    pub fn new(artist_hint: &str, album_hint: &str) -> Self {
        CandidateQuery {
            artist: names::fold(artist_hint),
            album: names::fold(album_hint),
        }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> &str {
        &self.album
    }
}

/// Supplies candidate releases for a query. Implementations own their transport and parsing; the
/// engine only sees validated releases.
pub trait CandidateSource {
    fn fetch(&self, query: &CandidateQuery) -> Result<Vec<CandidateRelease>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub ttl_secs: i64,
    /// Zero disables caching.
    pub capacity: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CachePolicy {
    fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_secs)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    releases: Vec<CandidateRelease>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CandidateCache {
    policy: CachePolicy,
    entries: HashMap<CandidateQuery, CacheEntry>,
}

impl CandidateCache {
    pub fn new(policy: CachePolicy) -> Self {
        CandidateCache {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached releases unless the entry has expired as of `now`.
    pub fn get(&self, query: &CandidateQuery, now: DateTime<Utc>) -> Option<&[CandidateRelease]> {
        self.entries
            .get(query)
            .filter(|e| !self.is_expired(e, now))
            .map(|e| e.releases.as_slice())
    }

    pub fn insert(&mut self, query: CandidateQuery, releases: Vec<CandidateRelease>, now: DateTime<Utc>) {
        if self.policy.capacity == 0 {
            return;
        }
        self.evict_expired(now);
        while self.entries.len() >= self.policy.capacity && !self.entries.contains_key(&query) {
            let oldest = self
                .entries
                .iter()
                .min_by(|(qa, a), (qb, b)| {
                    a.fetched_at
                        .cmp(&b.fetched_at)
                        .then_with(|| (&qa.artist, &qa.album).cmp(&(&qb.artist, &qb.album)))
                })
                .map(|(q, _)| q.clone());
            match oldest {
                Some(q) => {
                    debug!("evicting cached candidates for {:?}", q);
                    self.entries.remove(&q);
                }
                None => break,
            }
        }
        self.entries.insert(query, CacheEntry { releases, fetched_at: now });
    }

    /// Drops every entry that has expired as of `now`, returning how many were dropped.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.policy.ttl();
        let before = self.entries.len();
        self.entries.retain(|_, e| now - e.fetched_at < ttl);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.fetched_at >= self.policy.ttl()
    }
}

/// Wraps a source with a [`CandidateCache`]. The cache sits behind a mutex so the wrapper can be
/// shared like the source it wraps.
pub struct CachingCandidateSource<S> {
    inner: S,
    cache: Mutex<CandidateCache>,
}

impl<S: CandidateSource> CachingCandidateSource<S> {
    pub fn new(inner: S, policy: CachePolicy) -> Self {
        CachingCandidateSource {
            inner,
            cache: Mutex::new(CandidateCache::new(policy)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fetch_at(&self, query: &CandidateQuery, now: DateTime<Utc>) -> Result<Vec<CandidateRelease>> {
        {
            let cache = self.lock()?;
            if let Some(releases) = cache.get(query, now) {
                debug!("candidate cache hit for {:?}", query);
                return Ok(releases.to_vec());
            }
        }
        debug!("candidate cache miss for {:?}", query);
        let releases = self.inner.fetch(query)?;
        self.lock()?.insert(query.clone(), releases.clone(), now);
        Ok(releases)
    }

    pub fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.lock()?.evict_expired(now))
    }

    pub fn cached_queries(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CandidateCache>> {
        self.cache
            .lock()
            .map_err(|_| RoseError::Generic("Candidate cache lock poisoned".to_string()))
    }
}

impl<S: CandidateSource> CandidateSource for CachingCandidateSource<S> {
    fn fetch(&self, query: &CandidateQuery) -> Result<Vec<CandidateRelease>> {
        self.fetch_at(query, Utc::now())
    }
}
