//! Host parameter surface.
//!
//! The host stores user-facing options as loosely typed named values. Reading
//! them goes through a single generic `fetch`, which leaves the destination
//! untouched when the option is absent or holds a value of another type, so
//! callers can start from defaults and overlay whatever the host provides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single option value as stored by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Rgb([f32; 3]),
}

/// Conversion from a stored host value to a typed option.
pub trait ParamType: Sized {
    fn from_param(value: &ParamValue) -> Option<Self>;
}

impl ParamType for bool {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl ParamType for i32 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl ParamType for f32 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(f) => Some(*f as f32),
            // JSON hosts write whole numbers without a fraction.
            ParamValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }
}

impl ParamType for String {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl ParamType for [f32; 3] {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Rgb(rgb) => Some(*rgb),
            _ => None,
        }
    }
}

/// Named options supplied by the host for one procedural instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostParams {
    values: BTreeMap<String, ParamValue>,
}

impl HostParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of option names to values.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn set(&mut self, name: &str, value: ParamValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Builder-style `set`.
    pub fn with(mut self, name: &str, value: ParamValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Overwrite `param` with the named option if present and of a matching type.
    ///
    /// Returns whether `param` was written.
    pub fn fetch<T: ParamType>(&self, param: &mut T, name: &str) -> bool {
        let Some(value) = self.values.get(name) else {
            return false;
        };
        match T::from_param(value) {
            Some(typed) => {
                *param = typed;
                true
            }
            None => {
                log::warn!(
                    "[partio] option '{}' has unexpected type ({:?}), keeping default",
                    name,
                    value
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_absent_is_noop() {
        let params = HostParams::new();
        let mut radius = 0.01f32;
        assert!(!params.fetch(&mut radius, "arg_radius"));
        assert_eq!(radius, 0.01);
    }

    #[test]
    fn test_fetch_typed_values() {
        let params = HostParams::new()
            .with("arg_radius", ParamValue::Float(0.5))
            .with("global_motionBlurSteps", ParamValue::Int(3))
            .with("overrideRadiusPP", ParamValue::Bool(true))
            .with("arg_rgbFrom", ParamValue::Str("rgbPP".to_string()))
            .with("arg_defaultColor", ParamValue::Rgb([1.0, 0.5, 0.0]));

        let mut radius = 0.0f32;
        let mut steps = 1i32;
        let mut override_pp = false;
        let mut rgb_from = String::new();
        let mut color = [1.0f32; 3];

        assert!(params.fetch(&mut radius, "arg_radius"));
        assert!(params.fetch(&mut steps, "global_motionBlurSteps"));
        assert!(params.fetch(&mut override_pp, "overrideRadiusPP"));
        assert!(params.fetch(&mut rgb_from, "arg_rgbFrom"));
        assert!(params.fetch(&mut color, "arg_defaultColor"));

        assert_eq!(radius, 0.5);
        assert_eq!(steps, 3);
        assert!(override_pp);
        assert_eq!(rgb_from, "rgbPP");
        assert_eq!(color, [1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_fetch_type_mismatch_keeps_default() {
        let params = HostParams::new().with("arg_radius", ParamValue::Str("big".to_string()));
        let mut radius = 0.01f32;
        assert!(!params.fetch(&mut radius, "arg_radius"));
        assert_eq!(radius, 0.01);
    }

    #[test]
    fn test_from_json() {
        let params = HostParams::from_json(
            r#"{ "arg_file": "/tmp/cache.json", "global_fps": 25, "arg_radiusMult": 2.5,
                 "overrideRadiusPP": false, "arg_defaultColor": [0.1, 0.2, 0.3] }"#,
        )
        .unwrap();

        let mut fps = 24.0f32;
        assert!(params.fetch(&mut fps, "global_fps"));
        assert_eq!(fps, 25.0);

        let mut color = [1.0f32; 3];
        assert!(params.fetch(&mut color, "arg_defaultColor"));
        assert_eq!(color, [0.1, 0.2, 0.3]);
        assert!(params.contains("arg_file"));
    }
}
