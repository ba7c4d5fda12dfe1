//! Attribute resolution.
//!
//! Decides, once per cache load, which cache attribute (if any) feeds each
//! semantic role of the points primitive, and which roles fall back to a
//! constant. The result is a plain value: resolving the same cache with the
//! same configuration always yields equal bindings.

use std::collections::HashSet;

use crate::cache::{AttributeRef, ParticleSource};
use crate::config::EmissionConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{PartioError, Result};

/// Names accepted for the mandatory position attribute, in lookup order.
pub const POSITION_NAMES: [&str; 2] = ["position", "Position"];

/// Default names tried for velocity, after any configured name.
pub const VELOCITY_NAMES: [&str; 2] = ["velocity", "Velocity"];

/// Default names tried for a per-point radius, after any configured name.
pub const RADIUS_NAMES: [&str; 2] = ["radiusPP", "radius"];

/// Names that extra attributes may not use, since the primitive already exports them.
pub const RESERVED_NAMES: [&str; 6] = [
    "position",
    "velocity",
    "rgbPP",
    "incandescencePP",
    "opacityPP",
    "radiusPP",
];

/// Parameters the primitive always sets itself; an extra with one of these
/// names would overwrite them.
pub const BUILTIN_PARAMETERS: [&str; 5] = ["points", "radius", "mode", "opaque", "step_size"];

/// Upper bound on exported extra attributes per primitive.
pub const MAX_EXTRA_ATTRIBUTES: usize = 100;

/// Output attribute names on the primitive.
pub const COLOR_OUTPUT: &str = "rgbPP";
pub const INCANDESCENCE_OUTPUT: &str = "incandescencePP";
pub const OPACITY_OUTPUT: &str = "opacityPP";

/// Source of one semantic role: a cache attribute, or a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeBinding<T> {
    Cache(AttributeRef),
    Constant(T),
}

impl<T> AttributeBinding<T> {
    pub fn is_cache(&self) -> bool {
        matches!(self, AttributeBinding::Cache(_))
    }

    pub fn cache_attribute(&self) -> Option<&AttributeRef> {
        match self {
            AttributeBinding::Cache(attr) => Some(attr),
            AttributeBinding::Constant(_) => None,
        }
    }
}

/// Output slot type of an extra attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraKind {
    Float,
    Vector,
}

/// An extra per-point attribute copied verbatim into its own output array.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraBinding {
    pub attribute: AttributeRef,
    pub kind: ExtraKind,
}

/// The complete role assignment for one cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBindings {
    pub position: AttributeRef,
    /// Present when the cache can drive motion blur.
    pub velocity: Option<AttributeRef>,
    pub color: AttributeBinding<[f32; 3]>,
    pub incandescence: AttributeBinding<[f32; 3]>,
    pub opacity: AttributeBinding<f32>,
    pub radius: AttributeBinding<f32>,
    pub extras: Vec<ExtraBinding>,
    /// Skipped attributes and fallbacks noticed while resolving.
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedBindings {
    pub fn has_velocity(&self) -> bool {
        self.velocity.is_some()
    }

    pub fn has_color_pp(&self) -> bool {
        self.color.is_cache()
    }

    pub fn has_incandescence_pp(&self) -> bool {
        self.incandescence.is_cache()
    }

    pub fn has_opacity_pp(&self) -> bool {
        self.opacity.is_cache()
    }

    pub fn has_radius_pp(&self) -> bool {
        self.radius.is_cache()
    }
}

/// Role attributes are read as one scalar or the first three components.
fn supports_role_count(count: usize) -> bool {
    count == 1 || count >= 3
}

/// Resolve every role of `config` against `source`.
///
/// Fails only when no position attribute exists; everything else degrades to
/// a constant or is skipped with a diagnostic.
pub fn resolve<S: ParticleSource + ?Sized>(
    source: &S,
    config: &EmissionConfig,
) -> Result<ResolvedBindings> {
    let mut diagnostics = Vec::new();

    let position = POSITION_NAMES
        .iter()
        .filter_map(|name| source.attribute_info(name))
        .find(|attr| attr.count >= 3)
        .ok_or_else(|| PartioError::MissingRequiredAttribute {
            candidates: POSITION_NAMES.iter().map(|name| name.to_string()).collect(),
        })?;

    let velocity = resolve_velocity(source, config, &mut diagnostics);

    if !config.acceleration_from.is_empty() {
        log::debug!(
            "[partio] acceleration source '{}' is not used for point emission",
            config.acceleration_from
        );
    }

    let color = resolve_role(
        source,
        &config.color_from,
        COLOR_OUTPUT,
        config.default_color,
        &mut diagnostics,
    );
    let incandescence = resolve_role(
        source,
        &config.incandescence_from,
        INCANDESCENCE_OUTPUT,
        [0.0; 3],
        &mut diagnostics,
    );
    let opacity = resolve_role(
        source,
        &config.opacity_from,
        OPACITY_OUTPUT,
        config.default_opacity,
        &mut diagnostics,
    );
    let radius = resolve_radius(source, config, &mut diagnostics);
    let extras = resolve_extras(source, &config.extra_attributes, &mut diagnostics);

    Ok(ResolvedBindings {
        position,
        velocity,
        color,
        incandescence,
        opacity,
        radius,
        extras,
        diagnostics,
    })
}

fn resolve_velocity<S: ParticleSource + ?Sized>(
    source: &S,
    config: &EmissionConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<AttributeRef> {
    let configured = (!config.velocity_from.is_empty()).then_some(config.velocity_from.as_str());
    for name in configured.into_iter().chain(VELOCITY_NAMES) {
        let Some(attr) = source.attribute_info(name) else {
            continue;
        };
        if attr.count >= 3 {
            log::info!("[partio] found velocity attribute '{}', motion blur enabled", attr.name);
            return Some(attr);
        }
        diagnostics.push(Diagnostic::warn_from(&PartioError::AttributeTypeUnsupported {
            name: attr.name,
            count: attr.count,
        }));
    }
    None
}

fn resolve_role<S: ParticleSource + ?Sized, T>(
    source: &S,
    from: &str,
    output: &str,
    constant: T,
    diagnostics: &mut Vec<Diagnostic>,
) -> AttributeBinding<T> {
    if from.is_empty() {
        return AttributeBinding::Constant(constant);
    }
    match source.attribute_info(from) {
        Some(attr) if supports_role_count(attr.count) => {
            log::info!("[partio] found {} source attribute '{}'", output, attr.name);
            AttributeBinding::Cache(attr)
        }
        Some(attr) => {
            diagnostics.push(Diagnostic::warn_from(&PartioError::AttributeTypeUnsupported {
                name: attr.name,
                count: attr.count,
            }));
            AttributeBinding::Constant(constant)
        }
        None => {
            log::debug!("[partio] {} source '{}' not in cache, using constant", output, from);
            AttributeBinding::Constant(constant)
        }
    }
}

fn resolve_radius<S: ParticleSource + ?Sized>(
    source: &S,
    config: &EmissionConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> AttributeBinding<f32> {
    let constant = AttributeBinding::Constant(config.constant_radius());
    if config.override_radius_pp {
        return constant;
    }

    let configured = (!config.radius_from.is_empty()).then_some(config.radius_from.as_str());
    for name in configured.into_iter().chain(RADIUS_NAMES) {
        let Some(attr) = source.attribute_info(name) else {
            continue;
        };
        if supports_role_count(attr.count) {
            log::info!("[partio] found radius attribute '{}'", attr.name);
            return AttributeBinding::Cache(attr);
        }
        diagnostics.push(Diagnostic::warn_from(&PartioError::AttributeTypeUnsupported {
            name: attr.name,
            count: attr.count,
        }));
    }
    constant
}

fn resolve_extras<S: ParticleSource + ?Sized>(
    source: &S,
    list: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<ExtraBinding> {
    let tokens: Vec<&str> = list.split_whitespace().collect();
    let mut seen = HashSet::new();
    let mut extras = Vec::new();

    for &token in tokens.iter().take(MAX_EXTRA_ATTRIBUTES) {
        match resolve_extra(source, token, &mut seen) {
            Ok(extra) => extras.push(extra),
            Err(diagnostic) => {
                log::warn!("[partio] {}", diagnostic.message);
                diagnostics.push(diagnostic);
            }
        }
    }

    if tokens.len() > MAX_EXTRA_ATTRIBUTES {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::TooManyAttributes,
            format!(
                "{} extra attributes requested, only the first {} are exported",
                tokens.len(),
                MAX_EXTRA_ATTRIBUTES
            ),
        );
        log::warn!("[partio] {}", diagnostic.message);
        diagnostics.push(diagnostic);
    }

    extras
}

fn resolve_extra<'a, S: ParticleSource + ?Sized>(
    source: &S,
    token: &'a str,
    seen: &mut HashSet<&'a str>,
) -> std::result::Result<ExtraBinding, Diagnostic> {
    let Some(attribute) = source.attribute_info(token) else {
        return Err(Diagnostic::new(
            DiagnosticKind::AttributeNotFound,
            format!("extra attribute '{}' skipped, it doesn't exist in the cache", token),
        ));
    };
    if RESERVED_NAMES.contains(&token) {
        return Err(Diagnostic::new(
            DiagnosticKind::AttributeNameCollision,
            format!("extra attribute '{}' is already exported, skipping", token),
        ));
    }
    if BUILTIN_PARAMETERS.contains(&token) {
        return Err(Diagnostic::new(
            DiagnosticKind::AttributeNameCollision,
            format!("extra attribute '{}' clashes with a built-in primitive parameter, skipping", token),
        ));
    }
    if !seen.insert(token) {
        return Err(Diagnostic::new(
            DiagnosticKind::AttributeNameCollision,
            format!("extra attribute '{}' listed more than once, skipping", token),
        ));
    }
    let kind = match attribute.count {
        1 => ExtraKind::Float,
        3 => ExtraKind::Vector,
        count => {
            return Err(Diagnostic::from(&PartioError::AttributeTypeUnsupported {
                name: attribute.name,
                count,
            }))
        }
    };
    Ok(ExtraBinding { attribute, kind })
}
