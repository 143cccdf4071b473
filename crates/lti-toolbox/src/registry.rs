// crates/lti-toolbox/src/registry.rs
// ============================================================================
// Module: Consumer Registry
// Description: Creates and lists Tool Consumer trust records.
// Purpose: Manage consumer key/secret pairs through the data connector.
// Dependencies: rand, lti-toolbox-core
// ============================================================================

//! ## Overview
//! Consumer names and keys are unique within a tool. Creating a consumer
//! whose name or key already exists is a reported no-op: it returns `false`
//! and logs a warning, without touching the connector.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use lti_toolbox_core::ConsumerConnector;
use lti_toolbox_core::ConsumerKey;
use lti_toolbox_core::StorageError;
use lti_toolbox_core::ToolConsumer;
use lti_toolbox_core::hashing::sha256_hex;
use lti_toolbox_core::time::now_unix_millis;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::log::ToolLog;

/// Consumer registry over a data connector.
pub struct ConsumerRegistry<'a> {
    /// Consumer persistence.
    connector: &'a dyn ConsumerConnector,
    /// Tool log for creation outcomes.
    log: &'a ToolLog,
}

impl<'a> ConsumerRegistry<'a> {
    /// Creates a registry.
    #[must_use]
    pub fn new(connector: &'a dyn ConsumerConnector, log: &'a ToolLog) -> Self {
        Self {
            connector,
            log,
        }
    }

    /// Creates a consumer named `name`, generating a key and secret when not
    /// supplied. Returns false when the name or the key is already taken.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the connector fails.
    pub fn create_consumer(
        &self,
        name: &str,
        key: Option<&str>,
        secret: Option<&str>,
    ) -> Result<bool, StorageError> {
        if self.connector.list_consumers()?.iter().any(|consumer| consumer.name == name) {
            self.log.warning(format!(
                "Could not recreate consumer '{name}', consumer already exists"
            ));
            return Ok(false);
        }
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let key =
            ConsumerKey::new(key.map_or_else(|| generate_digest("key", nanos), str::to_string));
        if self.connector.load_consumer(&key)?.is_some() {
            self.log.warning(format!(
                "Could not create consumer '{name}', key {} is already in use",
                key.as_str()
            ));
            return Ok(false);
        }
        let secret = secret.map_or_else(|| generate_digest("secret", nanos), str::to_string);
        let consumer = ToolConsumer {
            key,
            name: name.to_string(),
            secret,
            enabled: true,
            created_at_ms: now_unix_millis(),
        };
        self.connector.save_consumer(&consumer)?;
        self.log.info(format!("Created consumer {name}"));
        Ok(true)
    }

    /// Lists consumers in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the connector fails.
    pub fn list_consumers(&self) -> Result<Vec<ToolConsumer>, StorageError> {
        self.connector.list_consumers()
    }
}

/// Hashes the timestamp together with random bytes into a credential.
fn generate_digest(label: &str, nanos: u128) -> String {
    let mut entropy = [0u8; 16];
    OsRng.fill_bytes(&mut entropy);
    let mut material = format!("{label}{nanos}").into_bytes();
    material.extend_from_slice(&entropy);
    sha256_hex(&material)
}
