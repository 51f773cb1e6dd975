//! Rebuild-on-change for resources derived from settings.
//!
//! Anything that caches a value built from [`super::SettingsStore`] output keeps
//! it in a [`VersionedSlot`] together with the config version it was built at,
//! and passes the version of the settings it reads on every use. There is no
//! notification channel: a dependent that skips the check keeps serving the old
//! resource.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

struct Built<T> {
    version: u64,
    value: Arc<T>,
}

pub struct VersionedSlot<T> {
    slot: Mutex<Option<Built<T>>>,
}

impl<T> Default for VersionedSlot<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> VersionedSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value built at `version`, rebuilding it first if the slot is
    /// empty or was built at a different version. A failed build leaves the
    /// slot empty. Concurrent callers wait for a single rebuild.
    pub async fn get_or_rebuild<F, Fut, E>(&self, version: u64, build: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(built) if built.version == version => return Ok(Arc::clone(&built.value)),
            Some(built) => debug!(
                built_at = built.version,
                current = version,
                "configuration changed, rebuilding"
            ),
            None => debug!(version, "building configuration-derived resource"),
        }

        *slot = None;
        let value = Arc::new(build().await?);
        *slot = Some(Built {
            version,
            value: Arc::clone(&value),
        });
        Ok(value)
    }

    /// Version the current value was built at.
    pub async fn current_version(&self) -> Option<u64> {
        self.slot.lock().await.as_ref().map(|b| b.version)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_reuses_value_for_same_version() {
        let slot = VersionedSlot::new();
        let builds = AtomicU32::new(0);
        let build = || async {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("client")
        };

        let a = slot.get_or_rebuild(3, build).await.unwrap();
        let b = slot.get_or_rebuild(3, build).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(slot.current_version().await, Some(3));
    }

    #[tokio::test]
    async fn test_rebuilds_on_version_change() {
        let slot = VersionedSlot::new();
        let old = slot
            .get_or_rebuild(1, || async { Ok::<_, String>("old-credentials") })
            .await
            .unwrap();
        let new = slot
            .get_or_rebuild(2, || async { Ok::<_, String>("new-credentials") })
            .await
            .unwrap();

        assert_eq!(*old, "old-credentials");
        assert_eq!(*new, "new-credentials");
        assert_eq!(slot.current_version().await, Some(2));
    }

    #[tokio::test]
    async fn test_failed_build_caches_nothing() {
        let slot: VersionedSlot<&str> = VersionedSlot::new();
        slot.get_or_rebuild(1, || async { Ok::<_, String>("v1") })
            .await
            .unwrap();

        let err = slot
            .get_or_rebuild(2, || async { Err::<&str, _>("bad credentials".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "bad credentials");
        assert_eq!(slot.current_version().await, None);

        slot.invalidate().await;
        let rebuilt = slot
            .get_or_rebuild(2, || async { Ok::<_, String>("v2") })
            .await
            .unwrap();
        assert_eq!(*rebuilt, "v2");
    }
}
