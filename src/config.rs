//! Emission configuration.
//!
//! `EmissionConfig` gathers every tunable of one emission pass. It can be
//! deserialized directly (all fields default) or overlaid from the host's
//! named options via `from_params`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::params::HostParams;

/// Frame rate assumed when the host supplies none, or a non-positive one.
pub const DEFAULT_FPS: f32 = 24.0;

/// How the renderer draws each point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Points,
    Spheres,
    Quads,
}

impl RenderMode {
    /// Map the host's enum index, falling back to `Points` for unknown values.
    pub fn from_index(index: i32) -> Self {
        match index {
            0 => RenderMode::Points,
            1 => RenderMode::Spheres,
            2 => RenderMode::Quads,
            other => {
                log::warn!("[partio] unknown render mode {}, using points", other);
                RenderMode::Points
            }
        }
    }

    /// Index written to the renderer's `mode` parameter.
    pub fn index(self) -> i32 {
        match self {
            RenderMode::Points => 0,
            RenderMode::Spheres => 1,
            RenderMode::Quads => 2,
        }
    }
}

/// Every tunable of one emission pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmissionConfig {
    /// Resolved cache file path.
    pub cache_path: PathBuf,
    pub render_mode: RenderMode,
    /// Ignore per-point radius attributes and always use the constant radius.
    pub override_radius_pp: bool,
    pub default_radius: f32,
    pub radius_multiplier: f32,
    /// Ceiling for per-point radii.
    pub max_particle_radius: f32,
    /// Floor for per-point radii; only applied when positive.
    pub min_particle_radius: f32,
    pub default_color: [f32; 3],
    pub default_opacity: f32,
    /// Number of motion-blur time samples per particle.
    pub motion_blur_steps: u32,
    pub fps: f32,
    /// Fraction of a frame the shutter stays open.
    pub motion_by_frame: f32,
    pub motion_blur_multiplier: f32,
    /// Volume step size; only written to the primitive when positive.
    pub step_size: f32,
    /// Space-delimited names of extra per-point attributes to export.
    pub extra_attributes: String,
    pub velocity_from: String,
    pub acceleration_from: String,
    pub color_from: String,
    pub opacity_from: String,
    pub radius_from: String,
    pub incandescence_from: String,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::new(),
            render_mode: RenderMode::Points,
            override_radius_pp: false,
            default_radius: 0.01,
            radius_multiplier: 1.0,
            max_particle_radius: 1_000_000.0,
            min_particle_radius: 0.0,
            default_color: [1.0, 1.0, 1.0],
            default_opacity: 1.0,
            motion_blur_steps: 1,
            fps: DEFAULT_FPS,
            motion_by_frame: 0.5,
            motion_blur_multiplier: 1.0,
            step_size: 0.0,
            extra_attributes: String::new(),
            velocity_from: String::new(),
            acceleration_from: String::new(),
            color_from: String::new(),
            opacity_from: String::new(),
            radius_from: String::new(),
            incandescence_from: String::new(),
        }
    }
}

impl EmissionConfig {
    /// Overlay the host's named options on the defaults.
    pub fn from_params(params: &HostParams) -> Self {
        let mut config = Self::default();

        let mut cache_path = String::new();
        if params.fetch(&mut cache_path, "arg_file") {
            config.cache_path = PathBuf::from(cache_path);
        }

        let mut render_type = config.render_mode.index();
        if params.fetch(&mut render_type, "arg_renderType") {
            config.render_mode = RenderMode::from_index(render_type);
        }

        let mut steps = config.motion_blur_steps as i32;
        if params.fetch(&mut steps, "global_motionBlurSteps") {
            config.motion_blur_steps = steps.max(1) as u32;
        }

        params.fetch(&mut config.override_radius_pp, "overrideRadiusPP");
        params.fetch(&mut config.default_radius, "arg_radius");
        params.fetch(&mut config.max_particle_radius, "arg_maxParticleRadius");
        params.fetch(&mut config.min_particle_radius, "arg_minParticleRadius");
        params.fetch(&mut config.radius_multiplier, "arg_radiusMult");
        params.fetch(&mut config.motion_blur_multiplier, "arg_motionBlurMult");
        params.fetch(&mut config.velocity_from, "arg_velFrom");
        params.fetch(&mut config.acceleration_from, "arg_accFrom");
        params.fetch(&mut config.color_from, "arg_rgbFrom");
        params.fetch(&mut config.incandescence_from, "arg_incandFrom");
        params.fetch(&mut config.opacity_from, "arg_opacFrom");
        params.fetch(&mut config.radius_from, "arg_radFrom");
        params.fetch(&mut config.default_color, "arg_defaultColor");
        params.fetch(&mut config.default_opacity, "arg_defaultOpac");
        params.fetch(&mut config.fps, "global_fps");
        params.fetch(&mut config.motion_by_frame, "global_motionByFrame");
        params.fetch(&mut config.step_size, "arg_stepSize");
        params.fetch(&mut config.extra_attributes, "arg_extraPPAttrs");

        config.sanitized()
    }

    /// Clamp values into the ranges the engine relies on.
    pub fn sanitized(mut self) -> Self {
        self.motion_blur_steps = self.motion_blur_steps.max(1);
        if !(self.fps.is_finite() && self.fps > 0.0) {
            log::warn!("[partio] invalid frame rate {}, using {}", self.fps, DEFAULT_FPS);
            self.fps = DEFAULT_FPS;
        }
        self.max_particle_radius = self.max_particle_radius.max(0.0);
        self.min_particle_radius = self.min_particle_radius.max(0.0);
        self.step_size = self.step_size.max(0.0);
        self
    }

    /// Radius shared by every particle when no per-point radius is bound.
    pub fn constant_radius(&self) -> f32 {
        self.default_radius * self.radius_multiplier
    }

    /// Apply the min/max radius limits to a scaled per-point radius.
    ///
    /// Compares explicitly so a NaN input is never replaced by a limit.
    pub fn clamp_radius(&self, radius: f32) -> f32 {
        if radius > self.max_particle_radius {
            self.max_particle_radius
        } else if self.min_particle_radius > 0.0 && radius < self.min_particle_radius {
            self.min_particle_radius
        } else {
            radius
        }
    }

    /// Step size to write to the primitive, if any.
    pub fn effective_step_size(&self) -> Option<f32> {
        (self.step_size > 0.0).then_some(self.step_size)
    }
}
