// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

//! Error types for token provisioning.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by the provisioning entry points.
///
/// An unreadable or malformed credential store is not represented here: it
/// is treated the same as "no credentials exist yet" and triggers a fresh
/// provisioning run instead of an error.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The backend utility could not be invoked, or exited unsuccessfully
    #[error("backend invocation failed: {0}")]
    Backend(#[from] BackendError),

    /// The credential record could not be written durably
    #[error("failed to write credential store {path}: {source}")]
    CredentialStoreWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The token-store directory could not be cleared or recreated
    #[error("failed to prepare token store {path}: {source}")]
    TokenStoreIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A token was reportedly initialised but no slot in the listing holds it
    #[error("no slot holds a token labelled {label:?}")]
    SlotNotFound { label: String },

    /// Credentials could not be obtained even after attempting provisioning
    #[error("provisioning failed: {source}")]
    ProvisioningFailed {
        #[source]
        source: Box<ProvisionError>,
    },
}
