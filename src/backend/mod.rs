// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

//! Backend seam for the PKCS#11 token utility.
//!
//! The provisioner only needs two operations from the backend: initialise a
//! token under a label, and list which slot holds which label. Everything
//! about how the real utility is invoked, including its human-readable
//! output format, stays behind this interface.

pub mod fake;
pub mod listing;
pub mod softhsm2;

use std::io;
use thiserror::Error;

/// One `(slot, label)` pair recovered from the backend's slot listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    /// Slot number, as the backend printed it
    pub slot: String,
    /// Token label assigned at initialisation
    pub label: String,
}

/// Errors raised by backend invocations.
///
/// A successful listing that simply lacks the wanted label is not an error;
/// that outcome is reported by the caller, not here.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The utility binary could not be started at all
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The utility ran but reported failure
    #[error("{command} exited with {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: String,
        stderr: String,
    },

    /// The utility produced output that was not valid UTF-8
    #[error("{command} produced non-UTF-8 output")]
    InvalidOutput { command: String },
}

/// Narrow interface to the token backend.
pub trait TokenBackend {
    /// Initialise a token under `label` with the given PIN pair.
    /// Idempotent by label on the backend side.
    fn init_token(&self, label: &str, pin: &str, so_pin: &str) -> Result<(), BackendError>;

    /// List all `(slot, label)` assignments the backend knows about.
    fn list_slots(&self) -> Result<Vec<SlotEntry>, BackendError>;
}

impl<B: TokenBackend + ?Sized> TokenBackend for &B {
    fn init_token(&self, label: &str, pin: &str, so_pin: &str) -> Result<(), BackendError> {
        (**self).init_token(label, pin, so_pin)
    }

    fn list_slots(&self) -> Result<Vec<SlotEntry>, BackendError> {
        (**self).list_slots()
    }
}
