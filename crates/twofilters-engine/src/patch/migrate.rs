use tracing::warn;

use super::ids;
use super::param::ParamMeta;
use crate::filter::FilterSetup;

/// Version written into every persisted patch.
///
/// 2: filter sub-model encoding swapped (standard became 0).
/// 3: "every two bars" retrigger mode inserted before "every four bars".
pub const PATCH_VERSION: u32 = 3;

/// Reinterprets a value persisted by an older schema. Values that end up
/// outside the parameter's range fall back to its default.
pub fn migrate_param_value_from_version(meta: &ParamMeta, value: f32, version: u32) -> f32 {
    let mut value = value;
    if version < 3 && meta.id == ids::routing(ids::RETRIGGER_MODE) && value.round() == 2.0 {
        value = 3.0;
    }
    if !meta.contains(value) {
        warn!(id = meta.id, value, version, "persisted value out of range; using default");
        return meta.default;
    }
    meta.clamp(value)
}

/// Decodes a persisted filter setup, renumbering fields older versions
/// encoded differently. Undecodable or unavailable setups yield `fallback`.
pub fn migrate_filter_setup_from_version(raw: [u32; 5], version: u32, fallback: FilterSetup) -> FilterSetup {
    let mut raw = raw;
    if version < 2 {
        raw[4] = match raw[4] {
            0 => 1,
            1 => 0,
            other => other,
        };
    }
    match FilterSetup::from_raw(raw).and_then(|setup| setup.validate().map(|()| setup)) {
        Ok(setup) => setup,
        Err(err) => {
            warn!(?raw, version, %err, "persisted filter setup rejected; using default");
            fallback
        }
    }
}
