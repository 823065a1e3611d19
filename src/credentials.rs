// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

//! Durable storage for the generated PIN pair.

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ProvisionError;

/// The secret pair guarding a token: the user PIN and the
/// security-officer PIN.
///
/// Stored as a single JSON object `{"pin": ..., "so_pin": ...}`. A record
/// with either field empty is never considered valid.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub pin: String,
    pub so_pin: String,
}

impl CredentialRecord {
    /// Generate a fresh record with two independent random PINs.
    pub fn generate(pin_length: usize) -> Self {
        Self {
            pin: generate_pin(pin_length),
            so_pin: generate_pin(pin_length),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.pin.is_empty() && !self.so_pin.is_empty()
    }
}

// The SO-PIN grants administrative control over the token; neither secret
// may appear in logs or debug output.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("pin", &"<redacted>")
            .field("so_pin", &"<redacted>")
            .finish()
    }
}

/// Random alphanumeric secret drawn from the OS CSPRNG.
pub fn generate_pin(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Reads and writes the credential record at a fixed path.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored record. A missing, unreadable, malformed or partial
    /// file all fold into `None`, which callers treat as "not provisioned
    /// yet".
    pub fn load(&self) -> Option<CredentialRecord> {
        let content = fs::read_to_string(&self.path);
        let Ok(content) = content else {
            debug!(path = %self.path.display(), "no readable credential store");
            return None;
        };

        let Ok(record) = serde_json::from_str::<CredentialRecord>(&content) else {
            debug!(path = %self.path.display(), "malformed credential store");
            return None;
        };

        if record.is_complete() {
            Some(record)
        } else {
            debug!(path = %self.path.display(), "incomplete credential store");
            None
        }
    }

    /// Persist the record. The file is created with mode 0600 at open time
    /// so it is never briefly readable by other users.
    pub fn store(&self, record: &CredentialRecord) -> Result<(), ProvisionError> {
        let write_err = |source: io::Error| ProvisionError::CredentialStoreWriteFailed {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string(record)
            .map_err(|e| write_err(e.into()))?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&self.path)
            .map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        Ok(())
    }

    /// Best-effort removal, used to roll back after a failed init so the
    /// record and the token store never diverge.
    pub fn remove(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "failed to remove credential store: {e}");
            }
        }
    }
}
