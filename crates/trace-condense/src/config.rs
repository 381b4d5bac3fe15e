// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Condensation tuning and the config storage port.

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key under which [`CondenseConfig`] is stored.
pub const CONDENSE_CONFIG_KEY: &str = "condense";

/// Tunables for one condensation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CondenseConfig {
    /// A pair merges only when its score strictly exceeds this.
    pub threshold: f64,
    /// Lookahead rounds of successor propagation.
    pub rounds: usize,
    /// Subtracted per unmatched outgoing transition.
    pub unmatched_penalty: f64,
    /// Upper bound on merges per pass. `None` means the state count at the
    /// start of the pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_merges: Option<usize>,
}

impl Default for CondenseConfig {
    fn default() -> Self {
        Self {
            threshold: 4.0,
            rounds: 2,
            unmatched_penalty: 0.5,
            max_merges: None,
        }
    }
}

impl CondenseConfig {
    /// Rejects settings a pass cannot run with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold.is_nan() {
            return Err(ConfigError::Invalid {
                field: "threshold",
                reason: "must be a number",
            });
        }
        if !self.unmatched_penalty.is_finite() || self.unmatched_penalty < 0.0 {
            return Err(ConfigError::Invalid {
                field: "unmatched_penalty",
                reason: "must be finite and not negative",
            });
        }
        Ok(())
    }
}

/// Where condensation settings are kept, as JSON documents by key.
pub trait ConfigStore {
    /// Document stored under `key`, or `None` when there is none.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError>;
    /// Replaces the document stored under `key`.
    fn write(&self, key: &str, document: &[u8]) -> Result<(), ConfigError>;
}

/// Failures loading, saving or checking condensation settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The store could not be read or written.
    #[error("config store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// A stored document is not valid [`CondenseConfig`] JSON.
    #[error("config `{key}` is not valid: {source}")]
    Parse {
        /// Key of the offending document.
        key: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A setting is out of range.
    #[error("config field `{field}` {reason}")]
    Invalid {
        /// Field name as written in the document.
        field: &'static str,
        /// What the value must satisfy.
        reason: &'static str,
    },
    /// The store has no location to work with.
    #[error("config store unavailable: {0}")]
    Unavailable(String),
}

/// Loads and saves [`CondenseConfig`] through a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Stored settings, if any were saved. An empty document counts as none.
    ///
    /// # Errors
    ///
    /// Store failures, [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn load_condense(&self) -> Result<Option<CondenseConfig>, ConfigError> {
        let Some(document) = self.store.read(CONDENSE_CONFIG_KEY)? else {
            return Ok(None);
        };
        if document.is_empty() {
            return Ok(None);
        }
        let config: CondenseConfig =
            serde_json::from_slice(&document).map_err(|source| ConfigError::Parse {
                key: CONDENSE_CONFIG_KEY.to_owned(),
                source,
            })?;
        config.validate()?;
        Ok(Some(config))
    }

    /// Stored settings, or the defaults when none are stored.
    pub fn condense_config(&self) -> Result<CondenseConfig, ConfigError> {
        Ok(self.load_condense()?.unwrap_or_default())
    }

    /// Validates and stores `config` as pretty JSON.
    pub fn save_condense(&self, config: &CondenseConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let document = serde_json::to_vec_pretty(config).map_err(|source| ConfigError::Parse {
            key: CONDENSE_CONFIG_KEY.to_owned(),
            source,
        })?;
        self.store.write(CONDENSE_CONFIG_KEY, &document)
    }
}

/// In-process store, handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    documents: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl ConfigStore for MemoryConfigStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.documents.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, document: &[u8]) -> Result<(), ConfigError> {
        self.documents
            .borrow_mut()
            .insert(key.to_owned(), document.to_vec());
        Ok(())
    }
}
