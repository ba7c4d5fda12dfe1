//! Particle emission.
//!
//! Walks every particle of a cache exactly once and fills the typed buffers of
//! a `PointsPrimitive` from resolved bindings:
//! - sanitises positions (non-finite particles are hidden at the origin)
//! - spreads positions over the motion-blur keys using velocity
//! - scales and clamps per-point radii
//! - copies color, incandescence, opacity and extra attributes
//!
//! Constant roles are written once; per-point roles get one value per particle
//! so every buffer stays index-aligned with the positions.

use glam::Vec3;

use crate::cache::ParticleSource;
use crate::config::EmissionConfig;
use crate::diagnostics::{BadParticleLog, Diagnostic, DiagnosticKind};
use crate::error::Result;
use crate::primitive::{AttributeValues, ExtraArray, ExtraValues, PointsPrimitive};
use crate::resolver::{self, AttributeBinding, ExtraKind, ResolvedBindings};

/// Perceptual weights used to reduce an RGB triple to one scalar.
pub const LUMINANCE_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Weighted sum of the first three components.
pub fn luminance(rgb: &[f32]) -> f32 {
    rgb[0] * LUMINANCE_WEIGHTS[0] + rgb[1] * LUMINANCE_WEIGHTS[1] + rgb[2] * LUMINANCE_WEIGHTS[2]
}

/// Result of one emission pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub primitive: PointsPrimitive,
    pub diagnostics: Vec<Diagnostic>,
}

impl Emission {
    /// An empty primitive carrying the reasons emission stopped.
    pub fn empty(config: &EmissionConfig, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            primitive: PointsPrimitive::empty(config.render_mode),
            diagnostics,
        }
    }
}

/// Shutter parameters shared by every particle of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionBlur {
    pub steps: usize,
    pub fps: f32,
    pub motion_by_frame: f32,
    pub multiplier: f32,
}

impl MotionBlur {
    pub fn from_config(config: &EmissionConfig) -> Self {
        Self {
            steps: config.motion_blur_steps.max(1) as usize,
            fps: config.fps,
            motion_by_frame: config.motion_by_frame,
            multiplier: config.motion_blur_multiplier,
        }
    }

    /// Position at every motion key for a particle moving at `velocity`.
    ///
    /// Keys are centred on the shutter: the first key sits half a shutter
    /// before `position`.
    pub fn samples(&self, position: Vec3, velocity: Vec3) -> impl Iterator<Item = Vec3> {
        let shutter = velocity / self.fps * self.motion_by_frame;
        let start = position - shutter * 0.5;
        let mut step = shutter;
        if self.steps > 1 {
            step /= (self.steps - 1) as f32;
        }
        step *= self.multiplier;
        (0..self.steps).map(move |s| start + step * s as f32)
    }
}

/// Replace non-finite positions with the origin. Returns the position and whether it was bad.
pub fn sanitize_position(raw: [f32; 3]) -> (Vec3, bool) {
    if raw.iter().all(|c| c.is_finite()) {
        (Vec3::from_array(raw), false)
    } else {
        (Vec3::ZERO, true)
    }
}

/// Per-point radius: scalar or luminance magnitude, scaled then clamped.
///
/// Returns `None` when the cache value is not finite.
fn per_point_radius(data: &[f32], config: &EmissionConfig) -> Option<f32> {
    let radius = if data.len() == 1 {
        data[0]
    } else {
        luminance(data).abs()
    };
    radius
        .is_finite()
        .then(|| config.clamp_radius(radius * config.radius_multiplier * config.default_radius))
}

/// Velocity components, or zero when any is not finite.
fn read_velocity(data: &[f32]) -> (Vec3, bool) {
    let velocity = Vec3::from_slice(data);
    if velocity.is_finite() {
        (velocity, false)
    } else {
        (Vec3::ZERO, true)
    }
}

/// Scalar broadcast to grey, or the first three components.
fn read_rgb(data: &[f32]) -> [f32; 3] {
    if data.len() == 1 {
        [data[0]; 3]
    } else {
        [data[0], data[1], data[2]]
    }
}

fn read_scalar(data: &[f32]) -> f32 {
    if data.len() == 1 {
        data[0]
    } else {
        luminance(data)
    }
}

/// Buffer for one role: per-point when cache-bound, otherwise the constant.
fn role_buffer<T: Copy>(binding: &AttributeBinding<T>, capacity: usize) -> AttributeValues<T> {
    match binding {
        AttributeBinding::Cache(_) => AttributeValues::PerPoint(Vec::with_capacity(capacity)),
        AttributeBinding::Constant(value) => AttributeValues::Constant(*value),
    }
}

fn push<T>(values: &mut AttributeValues<T>, value: T) {
    if let AttributeValues::PerPoint(buffer) = values {
        buffer.push(value);
    }
}

/// Fill a primitive from resolved bindings.
pub fn emit<S: ParticleSource + ?Sized>(
    source: &S,
    config: &EmissionConfig,
    bindings: &ResolvedBindings,
) -> Emission {
    let point_count = source.num_particles();
    let blur = MotionBlur::from_config(config);
    let mut bad_particles = BadParticleLog::new();
    let mut bad_radii = 0usize;
    let mut bad_velocities = 0usize;

    let mut positions = vec![Vec3::ZERO; point_count * blur.steps];
    let mut radius = role_buffer(&bindings.radius, point_count);
    let mut color = role_buffer(&bindings.color, point_count);
    let mut incandescence = role_buffer(&bindings.incandescence, point_count);
    let mut opacity = role_buffer(&bindings.opacity, point_count);
    let mut extras: Vec<ExtraValues> = bindings
        .extras
        .iter()
        .map(|extra| match extra.kind {
            ExtraKind::Float => ExtraValues::Float(Vec::with_capacity(point_count)),
            ExtraKind::Vector => ExtraValues::Vector(Vec::with_capacity(point_count)),
        })
        .collect();

    for i in 0..point_count {
        let raw = source.data(&bindings.position, i);
        let raw = [raw[0], raw[1], raw[2]];
        let (point, bad) = sanitize_position(raw);
        if bad {
            bad_particles.record(i, raw);
        }

        if let Some(attr) = bindings.radius.cache_attribute() {
            let value = per_point_radius(source.data(attr, i), config).unwrap_or_else(|| {
                bad_radii += 1;
                0.0
            });
            push(&mut radius, value);
        }

        match &bindings.velocity {
            Some(attr) => {
                let velocity = if bad {
                    Vec3::ZERO
                } else {
                    let (velocity, invalid) = read_velocity(source.data(attr, i));
                    if invalid {
                        bad_velocities += 1;
                    }
                    velocity
                };
                for (s, sample) in blur.samples(point, velocity).enumerate() {
                    positions[s * point_count + i] = sample;
                }
            }
            None => {
                for s in 0..blur.steps {
                    positions[s * point_count + i] = point;
                }
            }
        }

        if let Some(attr) = bindings.color.cache_attribute() {
            push(&mut color, read_rgb(source.data(attr, i)));
        }
        if let Some(attr) = bindings.incandescence.cache_attribute() {
            push(&mut incandescence, read_rgb(source.data(attr, i)));
        }
        if let Some(attr) = bindings.opacity.cache_attribute() {
            let value = if bad {
                0.0
            } else {
                read_scalar(source.data(attr, i))
            };
            push(&mut opacity, value);
        }

        for (extra, values) in bindings.extras.iter().zip(extras.iter_mut()) {
            let data = source.data(&extra.attribute, i);
            match values {
                ExtraValues::Float(buffer) => buffer.push(data[0]),
                ExtraValues::Vector(buffer) => buffer.push(Vec3::new(data[0], data[1], data[2])),
            }
        }
    }

    let mut diagnostics = bindings.diagnostics.clone();
    diagnostics.extend(bad_particles.finish(point_count));
    if bad_radii > 0 {
        diagnostics.push(non_finite_summary(bad_radii, point_count, "radii", "zero"));
    }
    if bad_velocities > 0 {
        diagnostics.push(non_finite_summary(
            bad_velocities,
            point_count,
            "velocities",
            "zero, so those points are not blurred",
        ));
    }

    let extras = bindings
        .extras
        .iter()
        .zip(extras)
        .map(|(extra, values)| ExtraArray {
            name: extra.attribute.name.clone(),
            values,
        })
        .collect();

    log::info!(
        "[partio] emitted {} points with {} motion keys from {}",
        point_count,
        blur.steps,
        config.cache_path.display()
    );

    Emission {
        primitive: PointsPrimitive {
            point_count,
            motion_steps: blur.steps,
            positions,
            radius,
            color,
            incandescence,
            opacity,
            extras,
            mode: config.render_mode,
            step_size: config.effective_step_size(),
        },
        diagnostics,
    }
}

fn non_finite_summary(count: usize, point_count: usize, what: &str, replacement: &str) -> Diagnostic {
    let message = format!(
        "{} of {} particles had non-finite {}; replaced with {}",
        count, point_count, what, replacement
    );
    log::warn!("[partio] {}", message);
    Diagnostic::new(DiagnosticKind::NonFiniteValue, message)
}

/// Resolve bindings and emit in one step.
///
/// Fails with `MissingRequiredAttribute` when the cache has no position.
pub fn emit_points<S: ParticleSource + ?Sized>(source: &S, config: &EmissionConfig) -> Result<Emission> {
    let bindings = resolver::resolve(source, config)?;
    Ok(emit(source, config, &bindings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ParticleCache;
    use crate::diagnostics::DiagnosticKind;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_luminance_of_white_is_exactly_one() {
        assert_eq!(luminance(&[1.0, 1.0, 1.0]), 1.0);
    }

    #[test]
    fn test_sanitize_position() {
        assert_eq!(sanitize_position([1.0, 2.0, 3.0]), (Vec3::new(1.0, 2.0, 3.0), false));
        assert_eq!(sanitize_position([f32::NAN, 2.0, 3.0]), (Vec3::ZERO, true));
        assert_eq!(sanitize_position([1.0, f32::INFINITY, 3.0]), (Vec3::ZERO, true));
        assert_eq!(sanitize_position([1.0, 2.0, f32::NEG_INFINITY]), (Vec3::ZERO, true));
    }

    #[test]
    fn test_motion_samples_single_step() {
        let blur = MotionBlur {
            steps: 1,
            fps: 24.0,
            motion_by_frame: 0.5,
            multiplier: 1.0,
        };
        let samples: Vec<_> = blur.samples(Vec3::ZERO, Vec3::new(48.0, 0.0, 0.0)).collect();
        assert_eq!(samples.len(), 1);
        // shutter = 48 / 24 * 0.5 = 1, centred start = -0.5
        assert_vec3_eq(samples[0], Vec3::new(-0.5, 0.0, 0.0));
    }

    #[test]
    fn test_motion_samples_span_shutter() {
        let blur = MotionBlur {
            steps: 3,
            fps: 24.0,
            motion_by_frame: 0.5,
            multiplier: 1.0,
        };
        let samples: Vec<_> = blur
            .samples(Vec3::new(1.0, 1.0, 1.0), Vec3::new(0.0, 48.0, 0.0))
            .collect();
        assert_vec3_eq(samples[0], Vec3::new(1.0, 0.5, 1.0));
        assert_vec3_eq(samples[1], Vec3::new(1.0, 1.0, 1.0));
        assert_vec3_eq(samples[2], Vec3::new(1.0, 1.5, 1.0));
    }

    #[test]
    fn test_motion_multiplier_scales_step_not_start() {
        let blur = MotionBlur {
            steps: 2,
            fps: 24.0,
            motion_by_frame: 1.0,
            multiplier: 2.0,
        };
        let samples: Vec<_> = blur.samples(Vec3::ZERO, Vec3::new(24.0, 0.0, 0.0)).collect();
        assert_vec3_eq(samples[0], Vec3::new(-0.5, 0.0, 0.0));
        assert_vec3_eq(samples[1], Vec3::new(1.5, 0.0, 0.0));
    }

    #[test]
    fn test_position_only_cache() {
        let cache = ParticleCache::builder(3)
            .vector("position", vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-1.0, 0.5, 4.0]])
            .build()
            .unwrap();
        let config = EmissionConfig {
            motion_blur_steps: 4,
            ..Default::default()
        };
        let emission = emit_points(&cache, &config).unwrap();
        let primitive = &emission.primitive;

        assert_eq!(primitive.point_count, 3);
        assert_eq!(primitive.positions.len(), 12);
        for step in 0..4 {
            assert_eq!(primitive.position(step, 1), Some(Vec3::new(1.0, 2.0, 3.0)));
            assert_eq!(primitive.position(step, 2), Some(Vec3::new(-1.0, 0.5, 4.0)));
        }
        assert_eq!(primitive.radius, AttributeValues::Constant(0.01));
        assert_eq!(primitive.color, AttributeValues::Constant([1.0, 1.0, 1.0]));
        assert_eq!(primitive.opacity, AttributeValues::Constant(1.0));
        assert_eq!(primitive.incandescence, AttributeValues::Constant([0.0; 3]));
        assert!(emission.diagnostics.is_empty());
    }

    #[test]
    fn test_bad_particle_is_zeroed_and_transparent() {
        let cache = ParticleCache::builder(2)
            .vector("position", vec![[f32::NAN, 1.0, 1.0], [1.0, 1.0, 1.0]])
            .vector("velocity", vec![[10.0, 10.0, 10.0], [24.0, 0.0, 0.0]])
            .float("opacityPP", vec![0.8, 0.6])
            .build()
            .unwrap();
        let config = EmissionConfig {
            motion_blur_steps: 3,
            opacity_from: "opacityPP".to_string(),
            ..Default::default()
        };
        let emission = emit_points(&cache, &config).unwrap();
        let primitive = &emission.primitive;

        for step in 0..3 {
            assert_eq!(primitive.position(step, 0), Some(Vec3::ZERO));
        }
        assert_eq!(primitive.opacity.get(0), Some(0.0));
        assert_eq!(primitive.opacity.get(1), Some(0.6));
        assert_eq!(primitive.point_count, 2);

        assert_eq!(emission.diagnostics.len(), 1);
        assert_eq!(emission.diagnostics[0].kind, DiagnosticKind::NonFiniteValue);
    }

    #[test]
    fn test_bad_particle_keeps_constant_opacity() {
        let cache = ParticleCache::builder(1)
            .vector("position", vec![[f32::INFINITY, 0.0, 0.0]])
            .build()
            .unwrap();
        let config = EmissionConfig {
            default_opacity: 0.4,
            ..Default::default()
        };
        let emission = emit_points(&cache, &config).unwrap();
        assert_eq!(emission.primitive.opacity, AttributeValues::Constant(0.4));
        assert_eq!(emission.primitive.position(0, 0), Some(Vec3::ZERO));
    }

    #[test]
    fn test_per_point_radius_scaled_and_clamped() {
        let cache = ParticleCache::builder(3)
            .vector("position", vec![[0.0; 3]; 3])
            .float("radiusPP", vec![1.0, 10.0, 1000.0])
            .build()
            .unwrap();
        let config = EmissionConfig {
            default_radius: 0.5,
            radius_multiplier: 2.0,
            max_particle_radius: 50.0,
            ..Default::default()
        };
        let emission = emit_points(&cache, &config).unwrap();
        assert_eq!(
            emission.primitive.radius,
            AttributeValues::PerPoint(vec![1.0, 10.0, 50.0])
        );
    }

    #[test]
    fn test_non_finite_radius_is_zeroed_not_clamped() {
        let cache = ParticleCache::builder(2)
            .vector("position", vec![[0.0; 3]; 2])
            .float("radiusPP", vec![f32::NAN, 2.0])
            .build()
            .unwrap();
        let emission = emit_points(&cache, &EmissionConfig::default()).unwrap();

        match &emission.primitive.radius {
            AttributeValues::PerPoint(radii) => {
                assert_eq!(radii[0], 0.0);
                assert!((radii[1] - 0.02).abs() < 1e-6);
            }
            other => panic!("expected per-point radii, got {:?}", other),
        }
        assert_eq!(emission.diagnostics.len(), 1);
        assert_eq!(emission.diagnostics[0].kind, DiagnosticKind::NonFiniteValue);
    }

    #[test]
    fn test_non_finite_velocity_is_zeroed() {
        let cache = ParticleCache::builder(2)
            .vector("position", vec![[0.0, 1.0, 1.0], [0.0; 3]])
            .vector("velocity", vec![[f32::NAN, 0.0, 0.0], [24.0, 0.0, 0.0]])
            .build()
            .unwrap();
        let config = EmissionConfig {
            motion_blur_steps: 2,
            motion_by_frame: 1.0,
            ..Default::default()
        };
        let emission = emit_points(&cache, &config).unwrap();
        let primitive = &emission.primitive;

        assert_eq!(primitive.position(0, 0), Some(Vec3::new(0.0, 1.0, 1.0)));
        assert_eq!(primitive.position(1, 0), Some(Vec3::new(0.0, 1.0, 1.0)));
        assert_vec3_eq(primitive.position(1, 1).unwrap(), Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(emission.diagnostics.len(), 1);
        assert_eq!(emission.diagnostics[0].kind, DiagnosticKind::NonFiniteValue);
    }

    #[test]
    fn test_vector_radius_uses_luminance_magnitude() {
        let cache = ParticleCache::builder(2)
            .vector("position", vec![[0.0; 3]; 2])
            .vector("radiusPP", vec![[1.0, 1.0, 1.0], [-1.0, -1.0, -1.0]])
            .build()
            .unwrap();
        let config = EmissionConfig {
            default_radius: 1.0,
            ..Default::default()
        };
        let emission = emit_points(&cache, &config).unwrap();
        assert_eq!(emission.primitive.radius, AttributeValues::PerPoint(vec![1.0, 1.0]));
    }

    #[test]
    fn test_constant_radius_ignores_cache_when_overridden() {
        let cache = ParticleCache::builder(2)
            .vector("position", vec![[0.0; 3]; 2])
            .float("radiusPP", vec![5.0, 6.0])
            .build()
            .unwrap();
        let config = EmissionConfig {
            override_radius_pp: true,
            default_radius: 0.25,
            radius_multiplier: 4.0,
            ..Default::default()
        };
        let emission = emit_points(&cache, &config).unwrap();
        assert_eq!(emission.primitive.radius, AttributeValues::Constant(1.0));
    }

    #[test]
    fn test_color_broadcast_and_opacity_luminance() {
        let cache = ParticleCache::builder(2)
            .vector("position", vec![[0.0; 3]; 2])
            .float("grey", vec![0.25, 0.5])
            .vector("rgbPP", vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
            .build()
            .unwrap();
        let config = EmissionConfig {
            color_from: "grey".to_string(),
            incandescence_from: "rgbPP".to_string(),
            opacity_from: "rgbPP".to_string(),
            ..Default::default()
        };
        let emission = emit_points(&cache, &config).unwrap();
        let primitive = &emission.primitive;

        assert_eq!(primitive.color.get(0), Some([0.25; 3]));
        assert_eq!(primitive.color.get(1), Some([0.5; 3]));
        assert_eq!(primitive.incandescence.get(0), Some([1.0, 0.0, 0.0]));
        assert!((primitive.opacity.get(0).unwrap() - 0.2126).abs() < 1e-6);
        assert!((primitive.opacity.get(1).unwrap() - 0.7152).abs() < 1e-6);
    }

    #[test]
    fn test_extra_attributes_copied() {
        let cache = ParticleCache::builder(2)
            .vector("position", vec![[0.0; 3]; 2])
            .float("age", vec![1.5, 2.5])
            .vector("vorticity", vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])
            .build()
            .unwrap();
        let config = EmissionConfig {
            extra_attributes: "age vorticity".to_string(),
            ..Default::default()
        };
        let emission = emit_points(&cache, &config).unwrap();
        let primitive = &emission.primitive;

        assert_eq!(
            primitive.extra("age").unwrap().values,
            ExtraValues::Float(vec![1.5, 2.5])
        );
        assert_eq!(
            primitive.extra("vorticity").unwrap().values,
            ExtraValues::Vector(vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)])
        );
    }

    #[test]
    fn test_per_point_buffers_cover_every_particle() {
        let n = 17;
        let cache = ParticleCache::builder(n)
            .vector("position", (0..n).map(|i| [i as f32, 0.0, 0.0]).collect())
            .vector("velocity", vec![[1.0, 0.0, 0.0]; n])
            .float("radiusPP", vec![1.0; n])
            .vector("rgbPP", vec![[0.5; 3]; n])
            .float("opacityPP", vec![1.0; n])
            .float("age", vec![0.0; n])
            .build()
            .unwrap();
        let config = EmissionConfig {
            motion_blur_steps: 5,
            color_from: "rgbPP".to_string(),
            opacity_from: "opacityPP".to_string(),
            extra_attributes: "age".to_string(),
            ..Default::default()
        };
        let primitive = emit_points(&cache, &config).unwrap().primitive;

        assert_eq!(primitive.positions.len(), n * 5);
        assert_eq!(primitive.radius.len(), n);
        assert_eq!(primitive.color.len(), n);
        assert_eq!(primitive.opacity.len(), n);
        assert_eq!(primitive.incandescence.len(), 1);
        match &primitive.extra("age").unwrap().values {
            ExtraValues::Float(values) => assert_eq!(values.len(), n),
            other => panic!("unexpected extra values {:?}", other),
        }
    }
}
