// Copyright 2025 Erst Users
// SPDX-License-Identifier: Apache-2.0

//! Parser for `softhsm2-util --show-slots` output.
//!
//! This is the only place the listing format is interpreted. The utility
//! prints a `Slot N` header line for each slot, followed by indented detail
//! lines; the token's `Label:` line always appears before the next slot
//! header, so a single top-to-bottom pass can attribute each label to the
//! most recent header.

use super::SlotEntry;

const SLOT_HEADER: &str = "Slot ";
const LABEL_MARKER: &str = "Label:";

/// Scan the listing text and collect every `(slot, label)` pair.
///
/// A header line must start at column zero (`Slot info:` lines are indented
/// and do not open a new slot). Label lines seen before any header are
/// ignored.
pub fn parse_slot_listing(output: &str) -> Vec<SlotEntry> {
    let mut entries = Vec::new();
    let mut current_slot: Option<&str> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix(SLOT_HEADER) {
            current_slot = Some(rest.trim());
            continue;
        }
        if let Some(idx) = line.find(LABEL_MARKER) {
            if let Some(slot) = current_slot {
                entries.push(SlotEntry {
                    slot: slot.to_string(),
                    label: line[idx + LABEL_MARKER.len()..].trim().to_string(),
                });
            }
        }
    }

    entries
}
