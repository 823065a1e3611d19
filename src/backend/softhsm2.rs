// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

//! Token backend shelling out to the real `softhsm2-util` binary.

use std::path::PathBuf;
use std::process::{Command, Output};
use tracing::debug;

use super::{listing, BackendError, SlotEntry, TokenBackend};
use crate::config::ProvisionerConfig;

pub struct SoftHsm2Util {
    util_path: PathBuf,
    run_as: Option<String>,
}

impl SoftHsm2Util {
    pub fn new(util_path: impl Into<PathBuf>) -> Self {
        Self {
            util_path: util_path.into(),
            run_as: None,
        }
    }

    pub fn from_config(config: &ProvisionerConfig) -> Self {
        Self {
            util_path: config.util_path.clone(),
            run_as: config.run_as.clone(),
        }
    }

    /// Run the init invocation as another user via `sudo -u`.
    pub fn run_as(mut self, user: impl Into<String>) -> Self {
        self.run_as = Some(user.into());
        self
    }

    fn command_name(&self) -> String {
        self.util_path.display().to_string()
    }

    fn run(&self, args: &[&str], as_worker: bool) -> Result<Output, BackendError> {
        let command = self.command_name();
        let mut cmd = if as_worker {
            if let Some(user) = &self.run_as {
                let mut c = Command::new("sudo");
                c.arg("-u").arg(user).arg(&self.util_path);
                c
            } else {
                Command::new(&self.util_path)
            }
        } else {
            Command::new(&self.util_path)
        };
        cmd.args(args);

        let output = cmd.output().map_err(|source| BackendError::Spawn {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(BackendError::NonZeroExit {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl TokenBackend for SoftHsm2Util {
    fn init_token(&self, label: &str, pin: &str, so_pin: &str) -> Result<(), BackendError> {
        debug!(label, "initialising token");
        // The token is created by the worker user so it retains access to
        // the token files it owns.
        self.run(
            &[
                "--init-token", "--free", "--label", label, "--pin", pin, "--so-pin", so_pin,
            ],
            true,
        )?;
        Ok(())
    }

    fn list_slots(&self) -> Result<Vec<SlotEntry>, BackendError> {
        let output = self.run(&["--show-slots"], false)?;
        let text =
            String::from_utf8(output.stdout).map_err(|_| BackendError::InvalidOutput {
                command: self.command_name(),
            })?;
        Ok(listing::parse_slot_listing(&text))
    }
}
