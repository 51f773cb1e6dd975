//! Stale-while-revalidate cache over the settings loader.
//!
//! At most one load runs at a time. The in-flight load is a shared future:
//! every waiter holds its own clone, so clearing the slot never strands a
//! waiter, and the load is spawned so it finishes even if all waiters go away.

use futures::future::{BoxFuture, FutureExt, Shared};
use shared_types::{CachedConfig, PublicSettings};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::loader::SettingsLoader;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_FAILURE_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsStoreConfig {
    /// How long a fetched snapshot is served without revalidation.
    pub ttl: Duration,
    /// Minimum spacing between load attempts after a failure.
    pub failure_cooldown: Duration,
}

impl Default for SettingsStoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            failure_cooldown: DEFAULT_FAILURE_COOLDOWN,
        }
    }
}

/// Settings paired with the config version they were served under.
///
/// A result from a load that `clear` discarded carries the version from before
/// the clear, so it never matches the current version.
#[derive(Debug, Clone)]
pub struct VersionedConfig {
    pub config: Arc<CachedConfig>,
    pub version: u64,
}

type RefreshFuture = Shared<BoxFuture<'static, VersionedConfig>>;

struct Snapshot {
    config: Arc<CachedConfig>,
    /// Config version at the time this snapshot was installed.
    version: u64,
    fetched_at: Instant,
    /// Past this point the snapshot is stale and a read starts a refresh.
    expires_at: Instant,
}

impl Snapshot {
    fn versioned(&self) -> VersionedConfig {
        VersionedConfig {
            config: Arc::clone(&self.config),
            version: self.version,
        }
    }
}

struct InFlight {
    id: u64,
    future: RefreshFuture,
}

#[derive(Default)]
struct CacheState {
    snapshot: Option<Snapshot>,
    in_flight: Option<InFlight>,
    /// Bumped by `clear`; loads started under an older generation are not installed.
    generation: u64,
    next_flight_id: u64,
}

struct Inner {
    loader: SettingsLoader,
    config: SettingsStoreConfig,
    state: Mutex<CacheState>,
    /// Only written while `state` is locked, so a snapshot's version and the
    /// counter move together.
    version: AtomicU64,
}

/// Process-wide settings cache. Cloning is cheap and every clone shares state.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<Inner>,
}

impl SettingsStore {
    pub fn new(loader: SettingsLoader, config: SettingsStoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                config,
                state: Mutex::new(CacheState::default()),
                version: AtomicU64::new(0),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current settings. Never fails: a fresh snapshot is returned as is, a
    /// stale one is returned while a background refresh runs, and a cold cache
    /// waits for the shared load (which resolves to defaults if the source is
    /// unreachable).
    pub async fn get_settings(&self) -> Arc<CachedConfig> {
        self.get_versioned().await.config
    }

    /// Like [`get_settings`](Self::get_settings), with the version the
    /// returned settings belong to.
    pub async fn get_versioned(&self) -> VersionedConfig {
        let pending = {
            let mut state = self.state();
            let now = Instant::now();
            let cached = state
                .snapshot
                .as_ref()
                .map(|s| (s.versioned(), now < s.expires_at, now - s.fetched_at));

            match cached {
                Some((versioned, true, _)) => return versioned,
                Some((versioned, false, age)) => {
                    debug!(?age, "serving stale settings while revalidating");
                    self.ensure_in_flight(&mut state);
                    return versioned;
                }
                None => self.ensure_in_flight(&mut state).future.clone(),
            }
        };
        pending.await
    }

    /// Force a load and wait for it. Joins a load that is already running.
    pub async fn refresh(&self) -> Arc<CachedConfig> {
        self.refresh_versioned().await.config
    }

    pub async fn refresh_versioned(&self) -> VersionedConfig {
        let pending = {
            let mut state = self.state();
            self.ensure_in_flight(&mut state).future.clone()
        };
        pending.await
    }

    /// Drop the snapshot so the next read performs a cold load, and signal
    /// dependents through the config version.
    pub fn clear(&self) {
        let mut state = self.state();
        state.snapshot = None;
        state.in_flight = None;
        state.generation += 1;
        let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
        info!(config_version = version, "settings cache cleared");
    }

    /// Monotonic counter; changes whenever the served settings may have changed.
    pub fn get_config_version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    pub async fn get_setting(&self, key: &str) -> Option<String> {
        self.get_settings().await.get(key)
    }

    pub async fn public_settings(&self) -> PublicSettings {
        let VersionedConfig { config, version } = self.get_versioned().await;
        PublicSettings::from_config(&config, version)
    }

    /// Start a load unless one is already running, and return the running one.
    fn ensure_in_flight<'a>(&self, state: &'a mut CacheState) -> &'a InFlight {
        let flight = match state.in_flight.take() {
            Some(flight) => flight,
            None => {
                state.next_flight_id += 1;
                let id = state.next_flight_id;
                let generation = state.generation;
                let started_at = self.get_config_version();
                let store = self.clone();
                let future = async move { store.run_refresh(id, generation, started_at).await }
                    .boxed()
                    .shared();

                tokio::spawn(future.clone());
                InFlight { id, future }
            }
        };
        state.in_flight.insert(flight)
    }

    async fn run_refresh(
        &self,
        flight_id: u64,
        generation: u64,
        started_at: u64,
    ) -> VersionedConfig {
        let outcome = self.inner.loader.load().await;

        let now = Instant::now();
        let mut state = self.state();
        if state.in_flight.as_ref().is_some_and(|f| f.id == flight_id) {
            state.in_flight = None;
        }
        let current = state.generation == generation;

        match outcome {
            Ok(config) => {
                let config = Arc::new(config);
                if !current {
                    debug!("settings cleared while loading; result not installed");
                    return VersionedConfig {
                        config,
                        version: started_at,
                    };
                }
                let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
                state.snapshot = Some(Snapshot {
                    config: Arc::clone(&config),
                    version,
                    fetched_at: now,
                    expires_at: now + self.inner.config.ttl,
                });
                info!(config_version = version, "settings refreshed");
                VersionedConfig { config, version }
            }
            Err(err) => {
                let retry_at = now + self.inner.config.failure_cooldown;
                if let Some(snapshot) = state.snapshot.as_mut() {
                    if current {
                        snapshot.expires_at = retry_at;
                    }
                    warn!(error = %err, "settings refresh failed, keeping previous settings");
                    return snapshot.versioned();
                }

                warn!(error = %err, "settings unavailable, using built-in defaults");
                let fallback = Arc::new(CachedConfig::fallback());
                if !current {
                    return VersionedConfig {
                        config: fallback,
                        version: started_at,
                    };
                }
                let snapshot = Snapshot {
                    config: fallback,
                    version: self.get_config_version(),
                    fetched_at: now,
                    expires_at: retry_at,
                };
                let versioned = snapshot.versioned();
                state.snapshot = Some(snapshot);
                versioned
            }
        }
    }
}
