// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

//! In-memory token backend for tests. Not suitable for production use.

use std::cell::RefCell;

use super::{listing, BackendError, SlotEntry, TokenBackend};

/// Scripted backend: replays a canned `--show-slots` listing through the
/// real parser and records every init invocation, so tests can assert how
/// often provisioning actually ran.
#[derive(Debug, Default)]
pub struct FakeTokenBackend {
    state: RefCell<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    listing: String,
    init_labels: Vec<String>,
    fail_init: Option<String>,
    fail_list: Option<String>,
}

impl FakeTokenBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw listing text the fake replays on `list_slots`.
    pub fn with_listing(self, text: impl Into<String>) -> Self {
        self.state.borrow_mut().listing = text.into();
        self
    }

    /// Make every `init_token` call fail with the given message.
    pub fn fail_init(self, message: impl Into<String>) -> Self {
        self.state.borrow_mut().fail_init = Some(message.into());
        self
    }

    /// Make every `list_slots` call fail with the given message.
    pub fn fail_list(self, message: impl Into<String>) -> Self {
        self.state.borrow_mut().fail_list = Some(message.into());
        self
    }

    /// Number of init invocations, including failed ones.
    pub fn init_call_count(&self) -> usize {
        self.state.borrow().init_labels.len()
    }

    /// Labels passed to init, in call order.
    pub fn init_labels(&self) -> Vec<String> {
        self.state.borrow().init_labels.clone()
    }
}

impl TokenBackend for FakeTokenBackend {
    fn init_token(&self, label: &str, _pin: &str, _so_pin: &str) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.init_labels.push(label.to_string());
        if let Some(message) = &state.fail_init {
            return Err(BackendError::NonZeroExit {
                command: "fake-softhsm2-util".to_string(),
                status: "exit status: 1".to_string(),
                stderr: message.clone(),
            });
        }
        Ok(())
    }

    fn list_slots(&self) -> Result<Vec<SlotEntry>, BackendError> {
        let state = self.state.borrow();
        if let Some(message) = &state.fail_list {
            return Err(BackendError::NonZeroExit {
                command: "fake-softhsm2-util".to_string(),
                status: "exit status: 1".to_string(),
                stderr: message.clone(),
            });
        }
        Ok(listing::parse_slot_listing(&state.listing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_init_calls() {
        let fake = FakeTokenBackend::new();
        fake.init_token("tok", "p", "s").unwrap();
        fake.init_token("tok", "p", "s").unwrap();
        assert_eq!(fake.init_call_count(), 2);
        assert_eq!(fake.init_labels(), vec!["tok", "tok"]);
    }

    #[test]
    fn test_replays_listing_through_parser() {
        let fake =
            FakeTokenBackend::new().with_listing("Slot 7\n    Label:            tok\n");
        let entries = fake.list_slots().unwrap();
        assert_eq!(entries[0].slot, "7");
        assert_eq!(entries[0].label, "tok");
    }

    #[test]
    fn test_injected_failures() {
        let fake = FakeTokenBackend::new().fail_init("boom");
        assert!(fake.init_token("tok", "p", "s").is_err());
        assert_eq!(fake.init_call_count(), 1);

        let fake = FakeTokenBackend::new().fail_list("down");
        assert!(fake.list_slots().is_err());
    }
}
