// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const SOFTHSM2_UTIL_CMD: &str = "/usr/bin/softhsm2-util";
pub const TOKEN_STORE: &str = "/var/lib/softhsm/tokens/";
pub const SOFTHSM2_LIB_PATH: &str = "/usr/lib/x86_64-linux-gnu/softhsm/libsofthsm2.so";
pub const STORED_PINS_FILE: &str = "/var/lib/softhsm/stored_pins.txt";
pub const BARBICAN_TOKEN_LABEL: &str = "barbican_token";
pub const PIN_LENGTH: usize = 32;

/// Plugin name published to the key-manager peer
pub const PLUGIN_NAME: &str = "softhsm2";

/// Paths and constants the provisioner operates with.
///
/// `Default` carries the production layout; `from_env` lets a deployment
/// override individual fields through `SOFTHSM_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Path to the softhsm2-util binary
    pub util_path: PathBuf,

    /// Directory the backend keeps token files in
    pub token_store: PathBuf,

    /// File the generated PIN pair is persisted to
    pub pins_file: PathBuf,

    /// PKCS#11 shared object handed to the key manager
    pub library_path: String,

    /// Label the token is initialised under
    pub token_label: String,

    /// Length of each generated PIN
    pub pin_length: usize,

    /// User the init invocation runs as; the token must be created by the
    /// worker user so it can open it later
    pub run_as: Option<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            util_path: PathBuf::from(SOFTHSM2_UTIL_CMD),
            token_store: PathBuf::from(TOKEN_STORE),
            pins_file: PathBuf::from(STORED_PINS_FILE),
            library_path: SOFTHSM2_LIB_PATH.to_string(),
            token_label: BARBICAN_TOKEN_LABEL.to_string(),
            pin_length: PIN_LENGTH,
            run_as: Some("barbican".to_string()),
        }
    }
}

impl ProvisionerConfig {
    /// Create configuration from environment variables, falling back to the
    /// production defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = env::var("SOFTHSM_UTIL") {
            config.util_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("SOFTHSM_TOKEN_STORE") {
            config.token_store = PathBuf::from(v);
        }
        if let Ok(v) = env::var("SOFTHSM_PINS_FILE") {
            config.pins_file = PathBuf::from(v);
        }
        if let Ok(v) = env::var("SOFTHSM_LIB_PATH") {
            config.library_path = v;
        }
        if let Ok(v) = env::var("SOFTHSM_TOKEN_LABEL") {
            config.token_label = v;
        }
        if let Ok(v) = env::var("SOFTHSM_RUN_AS") {
            config.run_as = if v.is_empty() { None } else { Some(v) };
        }
        config
    }
}
