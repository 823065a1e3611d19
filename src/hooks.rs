// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

//! Entry points for the two inbound orchestration triggers.

use serde::Serialize;
use tracing::{error, info};

use crate::backend::TokenBackend;
use crate::error::ProvisionError;
use crate::provisioner::{SlotDescriptor, TokenProvisioner};
use crate::relation::HsmRelation;

/// Unit status reported back to the orchestration platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Waiting,
    Active,
    Error,
}

/// Outcome of a hook invocation, serialized for the platform adapter.
#[derive(Debug, Serialize)]
pub struct HookReport {
    pub status: UnitStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_data: Option<SlotDescriptor>,
    /// Whether the hsm relation may be marked satisfied from this side
    pub relation_satisfied: bool,
}

impl HookReport {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: UnitStatus::Error,
            message: message.into(),
            plugin_data: None,
            relation_satisfied: false,
        }
    }
}

/// The `install` trigger: set up the token store once, unconditionally.
/// Fatal errors propagate to the caller as unit failure.
pub fn install<B: TokenBackend>(
    provisioner: &TokenProvisioner<B>,
) -> Result<HookReport, ProvisionError> {
    provisioner.ensure_ready()?;
    info!("token store configured");
    Ok(HookReport {
        status: UnitStatus::Waiting,
        message: "Charm installed and token store configured".to_string(),
        plugin_data: None,
        relation_satisfied: false,
    })
}

/// The `hsm-connected` trigger: publish the plugin descriptor to the peer.
///
/// Failures surface as an error status with a human-readable message; the
/// relation stays unsatisfied so the peer never configures itself from a
/// half-provisioned backend.
pub fn hsm_connected<B: TokenBackend>(
    provisioner: &TokenProvisioner<B>,
    relation: &mut dyn HsmRelation,
) -> HookReport {
    match provisioner.publish_descriptor(relation) {
        Ok(descriptor) => {
            info!(slot_id = %descriptor.slot_id, "published hsm plugin data");
            HookReport {
                status: UnitStatus::Active,
                message: "hsm relation data published".to_string(),
                plugin_data: Some(descriptor),
                relation_satisfied: true,
            }
        }
        Err(e) => {
            error!("failed to publish hsm plugin data: {e}");
            HookReport::failure(e.to_string())
        }
    }
}
