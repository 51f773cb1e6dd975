//! Scriptable credential source for unit tests.

use async_trait::async_trait;
use shared_types::SettingsCategory;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::source::{CredentialSource, SourceError};

/// Serves a mutable map of values. Every fetch round touches the `general`
/// category exactly once, so `rounds()` counts full loads and scripted failures
/// are consumed one per round.
#[derive(Default)]
pub struct ScriptedSource {
    values: Mutex<HashMap<String, String>>,
    failures: Mutex<VecDeque<SourceError>>,
    delay: Duration,
    calls: AtomicUsize,
    rounds: AtomicUsize,
}

impl ScriptedSource {
    pub fn with_values<const N: usize>(pairs: [(&str, &str); N]) -> Self {
        let source = Self::default();
        source.set_values(pairs);
        source
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_values<const N: usize>(&self, pairs: [(&str, &str); N]) {
        let mut values = self.values.lock().unwrap();
        values.clear();
        values.extend(pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
    }

    pub fn fail_next<I: IntoIterator<Item = SourceError>>(&self, errors: I) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rounds(&self) -> usize {
        self.rounds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for ScriptedSource {
    async fn get_settings_by_category(
        &self,
        category: SettingsCategory,
    ) -> Result<HashMap<String, String>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = if category == SettingsCategory::General {
            self.rounds.fetch_add(1, Ordering::SeqCst);
            self.failures.lock().unwrap().pop_front()
        } else {
            None
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let values = self.values.lock().unwrap();
        Ok(category
            .keys()
            .iter()
            .filter_map(|key| values.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect())
    }
}
