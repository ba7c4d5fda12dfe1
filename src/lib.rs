pub mod error;
pub mod diagnostics;

// Cache input and host configuration
pub mod cache;
pub mod params;
pub mod config;

// Translation engine
pub mod resolver;
pub mod primitive;
pub mod emitter;
pub mod procedural;

pub mod cli;

pub use cache::{ParticleCache, ParticleSource};
pub use config::{EmissionConfig, RenderMode};
pub use emitter::{emit, emit_points, Emission};
pub use error::{PartioError, Result};
pub use primitive::{PointsPrimitive, RecordingSink, RendererSink};
pub use procedural::PartioProcedural;
pub use resolver::{resolve, ResolvedBindings};
