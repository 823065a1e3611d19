// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for token provisioning against a scripted backend.

use std::fs;
use std::os::unix::fs::PermissionsExt;

use serde_json::json;
use tempfile::TempDir;

use softhsm_provisioner::backend::fake::FakeTokenBackend;
use softhsm_provisioner::backend::BackendError;
use softhsm_provisioner::error::ProvisionError;
use softhsm_provisioner::hooks;
use softhsm_provisioner::relation::MemoryRelation;
use softhsm_provisioner::{ProvisionerConfig, SlotDescriptor, TokenProvisioner};

const SHOW_SLOTS: &str = "\
Available slots:
Slot 0
    Slot info:
        Description: SoftHSM slot 0
        Manufacturer ID:  SoftHSM project
        Token present:    yes
    Token info:
        Model:            SoftHSM v2
        Initialized:      yes
        User PIN init.:   yes
        Label:            barbican_token
";

fn test_config(dir: &TempDir) -> ProvisionerConfig {
    ProvisionerConfig {
        util_path: "/usr/bin/softhsm2-util".into(),
        token_store: dir.path().join("tokens"),
        pins_file: dir.path().join("stored_pins.txt"),
        library_path: "/usr/lib/softhsm/libsofthsm2.so".to_string(),
        token_label: "barbican_token".to_string(),
        pin_length: 32,
        run_as: None,
    }
}

#[test]
fn test_fresh_provisioning() {
    let dir = TempDir::new().unwrap();
    let backend = FakeTokenBackend::new().with_listing(SHOW_SLOTS);
    let provisioner = TokenProvisioner::new(test_config(&dir), &backend);

    let record = provisioner.ensure_ready().unwrap();
    assert_eq!(record.pin.len(), 32);
    assert_eq!(record.so_pin.len(), 32);
    assert_ne!(record.pin, record.so_pin);

    // The credential file exists, owner-only, with both secrets
    let pins_file = dir.path().join("stored_pins.txt");
    let metadata = fs::metadata(&pins_file).unwrap();
    assert_eq!(metadata.permissions().mode() & 0o7777, 0o600);
    let content = fs::read_to_string(&pins_file).unwrap();
    assert!(content.contains(&record.pin));
    assert!(content.contains(&record.so_pin));

    // The token store was created as a shared-access directory
    let tokens = dir.path().join("tokens");
    assert!(tokens.is_dir());
    assert_eq!(
        fs::metadata(&tokens).unwrap().permissions().mode() & 0o7777,
        0o1777
    );

    assert_eq!(
        provisioner.resolve_slot("barbican_token").unwrap().as_deref(),
        Some("0")
    );
    assert_eq!(backend.init_call_count(), 1);
    assert_eq!(backend.init_labels(), vec!["barbican_token"]);
}

#[test]
fn test_ensure_ready_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let backend = FakeTokenBackend::new().with_listing(SHOW_SLOTS);
    let provisioner = TokenProvisioner::new(test_config(&dir), &backend);

    let first = provisioner.ensure_ready().unwrap();
    let file_after_first = fs::read(dir.path().join("stored_pins.txt")).unwrap();

    let second = provisioner.ensure_ready().unwrap();
    let file_after_second = fs::read(dir.path().join("stored_pins.txt")).unwrap();

    assert_eq!(first, second);
    assert_eq!(file_after_first, file_after_second);
    assert_eq!(backend.init_call_count(), 1);
}

#[test]
fn test_already_provisioned_skips_backend_and_token_store() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("stored_pins.txt"),
        r#"{"pin":"aaa","so_pin":"bbb"}"#,
    )
    .unwrap();

    let backend = FakeTokenBackend::new().with_listing(SHOW_SLOTS);
    let provisioner = TokenProvisioner::new(test_config(&dir), &backend);

    let record = provisioner.ensure_ready().unwrap();
    assert_eq!(record.pin, "aaa");
    assert_eq!(record.so_pin, "bbb");

    // Nothing else was touched: no init call, no token-store directory
    assert_eq!(backend.init_call_count(), 0);
    assert!(!dir.path().join("tokens").exists());
}

#[test]
fn test_token_store_file_replaced_by_directory() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    fs::write(&config.token_store, "i am not a directory").unwrap();

    let backend = FakeTokenBackend::new().with_listing(SHOW_SLOTS);
    let provisioner = TokenProvisioner::new(config, backend);

    provisioner.ensure_ready().unwrap();
    assert!(dir.path().join("tokens").is_dir());
}

#[test]
fn test_stale_token_store_directory_is_recreated() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    fs::create_dir_all(config.token_store.join("leftover")).unwrap();

    let backend = FakeTokenBackend::new().with_listing(SHOW_SLOTS);
    let provisioner = TokenProvisioner::new(config, backend);

    provisioner.ensure_ready().unwrap();
    let tokens = dir.path().join("tokens");
    assert!(tokens.is_dir());
    assert!(!tokens.join("leftover").exists());
}

#[test]
fn test_slot_lookup_miss_is_distinct_from_failure() {
    let dir = TempDir::new().unwrap();
    let backend =
        FakeTokenBackend::new().with_listing("Slot 0\n    Label:            other_token\n");
    let provisioner = TokenProvisioner::new(test_config(&dir), backend);

    assert_eq!(provisioner.resolve_slot("barbican_token").unwrap(), None);

    let backend = FakeTokenBackend::new().fail_list("cannot open listing");
    let provisioner = TokenProvisioner::new(test_config(&dir), backend);
    assert!(matches!(
        provisioner.resolve_slot("barbican_token"),
        Err(ProvisionError::Backend(BackendError::NonZeroExit { .. }))
    ));
}

#[test]
fn test_publish_descriptor_success() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("stored_pins.txt"),
        r#"{"pin":"p","so_pin":"s"}"#,
    )
    .unwrap();

    let backend = FakeTokenBackend::new().with_listing("Slot 3\n    Label:            barbican_token\n");
    let provisioner = TokenProvisioner::new(test_config(&dir), backend);

    let mut relation = MemoryRelation::new();
    let descriptor = provisioner.publish_descriptor(&mut relation).unwrap();

    assert_eq!(
        descriptor,
        SlotDescriptor {
            library_path: "/usr/lib/softhsm/libsofthsm2.so".to_string(),
            login: "p".to_string(),
            slot_id: "3".to_string(),
        }
    );
    assert_eq!(relation.name.as_deref(), Some("softhsm2"));
    assert_eq!(
        relation.plugin_data,
        Some(json!({
            "library_path": "/usr/lib/softhsm/libsofthsm2.so",
            "login": "p",
            "slot_id": "3",
        }))
    );
}

#[test]
fn test_publish_descriptor_slot_miss_is_fatal() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("stored_pins.txt"),
        r#"{"pin":"p","so_pin":"s"}"#,
    )
    .unwrap();

    let backend =
        FakeTokenBackend::new().with_listing("Slot 0\n    Label:            other_token\n");
    let provisioner = TokenProvisioner::new(test_config(&dir), backend);

    let mut relation = MemoryRelation::new();
    let err = provisioner.publish_descriptor(&mut relation).unwrap_err();
    assert!(matches!(err, ProvisionError::SlotNotFound { ref label } if label == "barbican_token"));

    // The name is still announced, but no plugin data may be published
    assert_eq!(relation.name.as_deref(), Some("softhsm2"));
    assert!(relation.plugin_data.is_none());
}

#[test]
fn test_publish_descriptor_wraps_provisioning_failure() {
    let dir = TempDir::new().unwrap();
    let backend = FakeTokenBackend::new().fail_init("init refused");
    let provisioner = TokenProvisioner::new(test_config(&dir), backend);

    let mut relation = MemoryRelation::new();
    let err = provisioner.publish_descriptor(&mut relation).unwrap_err();
    assert!(matches!(err, ProvisionError::ProvisioningFailed { .. }));
    assert!(relation.plugin_data.is_none());
}

#[test]
fn test_init_failure_rolls_back_credentials() {
    let dir = TempDir::new().unwrap();
    let backend = FakeTokenBackend::new().fail_init("label already taken");
    let provisioner = TokenProvisioner::new(test_config(&dir), &backend);

    let err = provisioner.ensure_ready().unwrap_err();
    assert!(matches!(err, ProvisionError::Backend(_)));
    assert_eq!(backend.init_call_count(), 1);

    // No credential record survives a failed init, so a rerun starts clean
    assert!(!dir.path().join("stored_pins.txt").exists());
}

#[test]
fn test_credential_write_failure_aborts_before_init() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.pins_file = dir.path().join("missing-dir").join("stored_pins.txt");

    let backend = FakeTokenBackend::new().with_listing(SHOW_SLOTS);
    let provisioner = TokenProvisioner::new(config, &backend);

    let err = provisioner.ensure_ready().unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::CredentialStoreWriteFailed { .. }
    ));
    // The backend is never asked to initialise a token whose credentials
    // could not be saved
    assert_eq!(backend.init_call_count(), 0);
}

#[test]
fn test_install_hook_reports_waiting() {
    let dir = TempDir::new().unwrap();
    let backend = FakeTokenBackend::new().with_listing(SHOW_SLOTS);
    let provisioner = TokenProvisioner::new(test_config(&dir), backend);

    let report = hooks::install(&provisioner).unwrap();
    assert_eq!(
        serde_json::to_value(&report).unwrap()["status"],
        json!("waiting")
    );
    assert!(!report.relation_satisfied);
}

#[test]
fn test_hsm_connected_hook_success() {
    let dir = TempDir::new().unwrap();
    let backend = FakeTokenBackend::new().with_listing(SHOW_SLOTS);
    let provisioner = TokenProvisioner::new(test_config(&dir), backend);

    let mut relation = MemoryRelation::new();
    let report = hooks::hsm_connected(&provisioner, &mut relation);

    let rendered = serde_json::to_value(&report).unwrap();
    assert_eq!(rendered["status"], json!("active"));
    assert_eq!(rendered["plugin_data"]["slot_id"], json!("0"));
    assert!(report.relation_satisfied);
    assert!(relation.plugin_data.is_some());
}

#[test]
fn test_hsm_connected_hook_failure_sets_error_status() {
    let dir = TempDir::new().unwrap();
    let backend =
        FakeTokenBackend::new().with_listing("Slot 0\n    Label:            other_token\n");
    let provisioner = TokenProvisioner::new(test_config(&dir), backend);

    let mut relation = MemoryRelation::new();
    let report = hooks::hsm_connected(&provisioner, &mut relation);

    let rendered = serde_json::to_value(&report).unwrap();
    assert_eq!(rendered["status"], json!("error"));
    assert!(report.message.contains("barbican_token"));
    assert!(!report.relation_satisfied);
}
