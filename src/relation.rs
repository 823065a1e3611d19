// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

/// The two operations the provisioner needs from the `hsm` peer relation.
pub trait HsmRelation {
    /// Publish the plugin name identifying this backend.
    fn set_name(&mut self, name: &str);

    /// Publish the plugin-data map the peer configures itself from.
    fn set_plugin_data(&mut self, data: Value);
}

/// In-memory relation recording what was published.
///
/// Tests assert on it directly; the hook binary uses it to capture plugin
/// data for the platform adapter that owns the real relation channel.
#[derive(Debug, Default)]
pub struct MemoryRelation {
    pub name: Option<String>,
    pub plugin_data: Option<Value>,
}

impl MemoryRelation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HsmRelation for MemoryRelation {
    fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    fn set_plugin_data(&mut self, data: Value) {
        self.plugin_data = Some(data);
    }
}
