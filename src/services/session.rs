//! Memoized session loading.
//!
//! `SessionCache` maps each selection tuple to a once-cell. The map lock is
//! only held to find or create the cell; the cell itself serializes the
//! fetch so concurrent loads of one key share a single provider call.
//! A failed fetch leaves the cell empty, so the next load retries.
//! Entries are never evicted: historical session data does not change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::models::{Session, SessionKey};
use crate::services::provider::{ProviderError, SessionProvider};

type Slot = Arc<OnceCell<Arc<Session>>>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to load session data: {0}")]
    FetchFailure(String),
}

/// Process-lifetime memo of loaded sessions, keyed by the exact selection.
#[derive(Debug, Default)]
pub struct SessionCache {
    slots: Mutex<HashMap<SessionKey, Slot>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &SessionKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.clone()).or_default().clone()
    }

    /// Drop the slot for `key` after a failed fetch, unless it has since been
    /// filled or another caller still holds it.
    fn discard_failed(&self, key: &SessionKey, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = slots.get(key) else {
            return;
        };
        // One reference in the map, one held by the failing caller
        let unclaimed = !current.initialized() && Arc::strong_count(current) == 2;
        if Arc::ptr_eq(current, slot) && unclaimed {
            slots.remove(key);
        }
    }

    /// Number of slots in the map, filled or not.
    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Return the cached session for `key`, if it has been loaded.
    #[cfg(test)]
    pub fn get(&self, key: &SessionKey) -> Option<Arc<Session>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of successfully loaded sessions.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.initialized()).count()
    }

    #[cfg(test)]
    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Loads sessions through a provider, memoizing successes in a shared cache.
#[derive(Clone)]
pub struct SessionLoader {
    provider: Arc<dyn SessionProvider>,
    cache: Arc<SessionCache>,
}

impl SessionLoader {
    pub fn new(provider: Arc<dyn SessionProvider>, cache: Arc<SessionCache>) -> Self {
        Self { provider, cache }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Load a session, fetching from the provider only on a cache miss.
    ///
    /// The caller guarantees a non-blank event; the HTTP layer rejects
    /// incomplete selections before reaching this point.
    pub async fn load_session(&self, key: &SessionKey) -> Result<Arc<Session>, LoadError> {
        let slot = self.cache.slot(key);

        if let Some(session) = slot.get() {
            tracing::debug!("Session cache hit for {}", key);
            return Ok(session.clone());
        }

        let session = slot
            .get_or_try_init(|| async {
                tracing::info!("Loading session for {}", key);
                let session = self.provider.fetch_session(key).await?;
                tracing::info!(
                    "Loaded {}: {} laps, {} weather samples",
                    key,
                    session.laps.len(),
                    session.weather.len()
                );
                Ok::<_, ProviderError>(Arc::new(session))
            })
            .await
            .map_err(|e| {
                tracing::warn!("Error loading session {}: {}", key, e);
                self.cache.discard_failed(key, &slot);
                LoadError::FetchFailure(e.to_string())
            })?;

        Ok(session.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{LapRecord, SessionInfo, SessionType, WeatherSample};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    /// In-memory provider that counts fetches and can be told to fail.
    pub(crate) struct FakeProvider {
        pub(crate) fetches: AtomicUsize,
        pub(crate) failing: AtomicBool,
        pub(crate) laps: Vec<LapRecord>,
        pub(crate) weather: Vec<WeatherSample>,
    }

    impl FakeProvider {
        pub(crate) fn new(laps: Vec<LapRecord>, weather: Vec<WeatherSample>) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                laps,
                weather,
            }
        }

        pub(crate) fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionProvider for FakeProvider {
        async fn fetch_session(&self, key: &SessionKey) -> Result<Session, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            // Give concurrent callers a chance to race on the same key
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProviderError::SessionNotFound(key.to_string()));
            }
            Ok(Session {
                key: key.clone(),
                info: SessionInfo {
                    provider_key: 9161,
                    session_name: key.session_type.to_string(),
                    location: Some(key.event.clone()),
                    country_name: None,
                    circuit_short_name: None,
                    date_start: Utc::now(),
                },
                laps: self.laps.clone(),
                weather: self.weather.clone(),
            })
        }
    }

    fn sample_lap() -> LapRecord {
        LapRecord {
            driver: "VER".to_string(),
            lap_number: 1,
            lap_start: Duration::seconds(100),
            lap_time: Some(Duration::seconds(85)),
            is_pit_out_lap: false,
            is_pit_in_lap: false,
        }
    }

    fn loader(provider: Arc<FakeProvider>) -> SessionLoader {
        SessionLoader::new(provider, Arc::new(SessionCache::new()))
    }

    #[tokio::test]
    async fn test_identical_loads_fetch_once() {
        let provider = Arc::new(FakeProvider::new(vec![sample_lap()], vec![]));
        let loader = loader(provider.clone());
        let key = SessionKey::new(2023, "Monza", SessionType::Race);

        let first = assert_ok!(loader.load_session(&key).await);
        let second = assert_ok!(loader.load_session(&key).await);

        assert_eq!(provider.fetch_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let provider = Arc::new(FakeProvider::new(vec![sample_lap()], vec![]));
        let loader = loader(provider.clone());

        assert_ok!(
            loader
                .load_session(&SessionKey::new(2023, "Monza", SessionType::Race))
                .await
        );
        assert_ok!(
            loader
                .load_session(&SessionKey::new(2023, "Monza", SessionType::Qualifying))
                .await
        );
        assert_ok!(
            loader
                .load_session(&SessionKey::new(2022, "Monza", SessionType::Race))
                .await
        );

        assert_eq!(provider.fetch_count(), 3);
        assert_eq!(loader.cache().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let provider = Arc::new(FakeProvider::new(vec![sample_lap()], vec![]));
        let loader = loader(provider.clone());
        let key = SessionKey::new(2023, "Monza", SessionType::Race);

        let (a, b, c) = tokio::join!(
            loader.load_session(&key),
            loader.load_session(&key),
            loader.load_session(&key)
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let provider = Arc::new(FakeProvider::new(vec![sample_lap()], vec![]));
        provider.failing.store(true, Ordering::SeqCst);
        let loader = loader(provider.clone());
        let key = SessionKey::new(2023, "Monza", SessionType::Race);

        let err = assert_err!(loader.load_session(&key).await);
        assert!(err.to_string().starts_with("Failed to load session data"));
        assert_eq!(loader.cache().len(), 0);
        assert!(loader.cache().get(&key).is_none());

        // Provider recovers; the next call re-attempts the fetch
        provider.failing.store(false, Ordering::SeqCst);
        assert_ok!(loader.load_session(&key).await);
        assert_eq!(provider.fetch_count(), 2);
        assert!(loader.cache().get(&key).is_some());
    }

    #[tokio::test]
    async fn test_failed_loads_leave_no_slots() {
        let provider = Arc::new(FakeProvider::new(vec![sample_lap()], vec![]));
        provider.failing.store(true, Ordering::SeqCst);
        let loader = loader(provider.clone());

        for i in 0..50 {
            let key = SessionKey::new(2023, format!("nowhere-{}", i), SessionType::Race);
            assert_err!(loader.load_session(&key).await);
        }

        assert_eq!(provider.fetch_count(), 50);
        assert_eq!(loader.cache().len(), 0);
        assert_eq!(loader.cache().slot_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_failed_loads_leave_no_slots() {
        let provider = Arc::new(FakeProvider::new(vec![sample_lap()], vec![]));
        provider.failing.store(true, Ordering::SeqCst);
        let loader = loader(provider.clone());
        let key = SessionKey::new(2023, "nowhere", SessionType::Race);

        let (a, b, c) = tokio::join!(
            loader.load_session(&key),
            loader.load_session(&key),
            loader.load_session(&key)
        );

        assert!(a.is_err() && b.is_err() && c.is_err());
        assert_eq!(loader.cache().slot_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_load_keeps_its_slot() {
        let provider = Arc::new(FakeProvider::new(vec![sample_lap()], vec![]));
        let loader = loader(provider.clone());

        assert_ok!(
            loader
                .load_session(&SessionKey::new(2023, "Monza", SessionType::Race))
                .await
        );
        assert_eq!(loader.cache().slot_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let provider = Arc::new(FakeProvider::new(vec![sample_lap()], vec![]));
        let loader = loader(provider.clone());
        let key = SessionKey::new(2023, "Monza", SessionType::Race);

        assert_ok!(loader.load_session(&key).await);
        loader.cache().clear();
        assert_eq!(loader.cache().len(), 0);
        assert_ok!(loader.load_session(&key).await);

        assert_eq!(provider.fetch_count(), 2);
    }
}
