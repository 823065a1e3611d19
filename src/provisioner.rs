// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

//! Idempotent token provisioning and slot discovery.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use tracing::{debug, info};

use crate::backend::TokenBackend;
use crate::config::{ProvisionerConfig, PLUGIN_NAME};
use crate::credentials::{CredentialRecord, CredentialStore};
use crate::error::ProvisionError;
use crate::relation::HsmRelation;

/// Plugin descriptor published to the key-manager peer.
///
/// Computed fresh on every peer connection; the slot number is assigned by
/// the backend at init time and is never persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDescriptor {
    pub library_path: String,
    pub login: String,
    pub slot_id: String,
}

impl SlotDescriptor {
    /// Plugin-data map as published on the relation.
    pub fn to_plugin_data(&self) -> serde_json::Value {
        json!({
            "library_path": self.library_path,
            "login": self.login,
            "slot_id": self.slot_id,
        })
    }
}

/// Ensures a PKCS#11 token exists, generates and durably stores its access
/// credentials exactly once, and can answer which slot number the backend
/// assigned to the token.
pub struct TokenProvisioner<B> {
    config: ProvisionerConfig,
    store: CredentialStore,
    backend: B,
}

impl<B: TokenBackend> TokenProvisioner<B> {
    pub fn new(config: ProvisionerConfig, backend: B) -> Self {
        let store = CredentialStore::new(config.pins_file.clone());
        Self {
            config,
            store,
            backend,
        }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Return the stored credentials, provisioning the token store first if
    /// no valid record exists.
    ///
    /// Safe to call on every install, upgrade and relation event: a valid
    /// record short-circuits before any destructive work or backend call.
    pub fn ensure_ready(&self) -> Result<CredentialRecord, ProvisionError> {
        if let Some(record) = self.store.load() {
            debug!("token store already provisioned");
            return Ok(record);
        }

        self.reset_token_store()?;

        let record = CredentialRecord::generate(self.config.pin_length);
        self.store.store(&record)?;

        if let Err(e) =
            self.backend
                .init_token(&self.config.token_label, &record.pin, &record.so_pin)
        {
            // Keep the record and the token consistent: drop the record so
            // the next run re-provisions from scratch.
            self.store.remove();
            return Err(e.into());
        }

        info!(label = %self.config.token_label, "initialised token store");
        Ok(record)
    }

    /// Look up the slot number holding `label`.
    ///
    /// `Ok(None)` means the label was absent from a successful listing, a
    /// distinct outcome from a failed backend invocation.
    pub fn resolve_slot(&self, label: &str) -> Result<Option<String>, ProvisionError> {
        let entries = self.backend.list_slots()?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.slot))
    }

    /// Publish the plugin name and slot descriptor for this backend.
    ///
    /// Fatal if credentials cannot be obtained even after attempting
    /// provisioning, or if the token is missing from the slot listing
    /// despite a valid credential record.
    pub fn publish_descriptor(
        &self,
        relation: &mut dyn HsmRelation,
    ) -> Result<SlotDescriptor, ProvisionError> {
        debug!("setting plugin name to {PLUGIN_NAME}");
        relation.set_name(PLUGIN_NAME);

        let record = self
            .ensure_ready()
            .map_err(|source| ProvisionError::ProvisioningFailed {
                source: Box::new(source),
            })?;

        let slot_id = self
            .resolve_slot(&self.config.token_label)?
            .ok_or_else(|| ProvisionError::SlotNotFound {
                label: self.config.token_label.clone(),
            })?;

        let descriptor = SlotDescriptor {
            library_path: self.config.library_path.clone(),
            login: record.pin,
            slot_id,
        };
        relation.set_plugin_data(descriptor.to_plugin_data());
        Ok(descriptor)
    }

    /// Clear whatever occupies the token-store path, whether a stale
    /// directory or a plain file squatting there, and recreate it.
    ///
    /// 1777: tokens are created by the worker user, and whoever creates a
    /// token must keep access to it.
    fn reset_token_store(&self) -> Result<(), ProvisionError> {
        let path = &self.config.token_store;
        let io_err = |source: io::Error| ProvisionError::TokenStoreIo {
            path: path.clone(),
            source,
        };

        if path.exists() {
            if path.is_dir() {
                fs::remove_dir_all(path).map_err(io_err)?;
            } else {
                fs::remove_file(path).map_err(io_err)?;
            }
        }
        fs::create_dir_all(path).map_err(io_err)?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o1777)).map_err(io_err)?;
        Ok(())
    }
}
