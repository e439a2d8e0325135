//! Persisted form of a patch: raw id/value pairs plus filter setup integers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::migrate::{migrate_filter_setup_from_version, migrate_param_value_from_version, PATCH_VERSION};
use super::{Patch, NUM_FILTERS};
use crate::error::StateError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchState {
    pub version: u32,
    pub name: String,
    pub values: BTreeMap<u32, f32>,
    #[serde(default)]
    pub filters: Vec<[u32; 5]>,
}

impl Default for PatchState {
    fn default() -> Self {
        Patch::new().to_state()
    }
}

impl PatchState {
    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Patch {
    /// Captures the ramp targets, so a snapshot taken mid-ramp stores where
    /// every parameter is heading.
    pub fn to_state(&self) -> PatchState {
        PatchState {
            version: PATCH_VERSION,
            name: self.name.as_str().to_owned(),
            values: self.params.iter().map(|p| (p.id(), p.target())).collect(),
            filters: self.filter_setups.iter().map(|setup| setup.to_raw()).collect(),
        }
    }

    /// Replaces the whole patch with `state`, migrating older encodings.
    /// Ids missing from the state keep their defaults; unknown ids are
    /// skipped.
    pub fn apply_state(&mut self, state: &PatchState) -> Result<(), StateError> {
        if state.version > PATCH_VERSION {
            return Err(StateError::FutureVersion {
                found: state.version,
                supported: PATCH_VERSION,
            });
        }
        self.reset_to_defaults();
        for (&id, &value) in &state.values {
            let Some(index) = self.param_index(id) else {
                warn!(id, "persisted parameter id is unknown; skipping");
                continue;
            };
            let value = migrate_param_value_from_version(&self.params[index].meta, value, state.version);
            self.set_value_direct(index, value);
        }
        let defaults = Self::default_filter_setups();
        for slot in 0..NUM_FILTERS {
            self.filter_setups[slot] = match state.filters.get(slot) {
                Some(raw) => migrate_filter_setup_from_version(*raw, state.version, defaults[slot]),
                None => defaults[slot],
            };
        }
        self.name.set(&state.name);
        self.dirty = false;
        Ok(())
    }
}

/// Parses arbitrary bytes as a persisted state and applies it.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_state(data: &[u8]) {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(state) = PatchState::from_json(text) {
        let mut patch = Patch::new();
        if patch.apply_state(&state).is_ok() {
            for param in patch.params() {
                assert!(param.meta.contains(param.value()));
            }
        }
    }
}
