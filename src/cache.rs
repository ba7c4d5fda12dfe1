//! Particle cache types and loading.
//!
//! A cache is an immutable snapshot of N particles at one time sample. Each
//! attribute has a name, an element type and a fixed number of `f32`
//! components per particle, stored contiguously.
//!
//! ## File layout
//!
//! ```json
//! {
//!   "particleCount": 2,
//!   "attributes": [
//!     { "name": "position", "type": "vector", "count": 3, "data": [0, 0, 0, 1, 0, 0] },
//!     { "name": "radiusPP", "type": "float", "count": 1, "data": [0.5, 0.25] }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PartioError, Result};

/// Element type of a cache attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Float,
    Vector,
}

/// Resolved handle to one attribute of a cache.
///
/// Carries the slot index so reads never need to look the name up again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    pub name: String,
    pub attr_type: AttributeType,
    /// Components per particle.
    pub count: usize,
    index: usize,
}

impl AttributeRef {
    pub fn new(name: impl Into<String>, attr_type: AttributeType, count: usize, index: usize) -> Self {
        Self {
            name: name.into(),
            attr_type,
            count,
            index,
        }
    }

    /// Slot of this attribute inside its source.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Read access to loaded particle data.
///
/// `ParticleCache` is the in-crate implementation; hosts that decode another
/// on-disk format can implement this directly.
pub trait ParticleSource {
    /// Number of particles in the cache.
    fn num_particles(&self) -> usize;

    /// Look up an attribute by exact name.
    fn attribute_info(&self, name: &str) -> Option<AttributeRef>;

    /// Components of `attr` for one particle. `particle` must be below `num_particles()`.
    fn data(&self, attr: &AttributeRef, particle: usize) -> &[f32];
}

/// One named attribute with its packed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub count: usize,
    pub data: Vec<f32>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    particle_count: usize,
    #[serde(default)]
    attributes: Vec<CacheAttribute>,
}

/// An immutable, fully loaded particle cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleCache {
    particle_count: usize,
    attributes: Vec<CacheAttribute>,
}

/// Whether a cache file exists on disk.
pub fn cache_exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).is_ok()
}

impl ParticleCache {
    /// Start building a cache of `particle_count` particles in memory.
    pub fn builder(particle_count: usize) -> ParticleCacheBuilder {
        ParticleCacheBuilder {
            particle_count,
            attributes: Vec::new(),
        }
    }

    /// Load a cache file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !cache_exists(path) {
            return Err(PartioError::CacheFileNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let cache = Self::from_json(&contents)?;
        log::info!(
            "[partio] loaded {} points with {} attributes from {}",
            cache.particle_count,
            cache.attributes.len(),
            path.display()
        );
        Ok(cache)
    }

    /// Parse a cache from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CacheFile = serde_json::from_str(json)?;
        Self::from_parts(file.particle_count, file.attributes)
    }

    /// Serialize the cache to JSON.
    pub fn to_json(&self) -> Result<String> {
        let file = CacheFile {
            particle_count: self.particle_count,
            attributes: self.attributes.clone(),
        };
        Ok(serde_json::to_string(&file)?)
    }

    fn from_parts(particle_count: usize, attributes: Vec<CacheAttribute>) -> Result<Self> {
        validate_attributes(particle_count, &attributes)?;
        Ok(Self {
            particle_count,
            attributes,
        })
    }

    /// All attributes in declaration order.
    pub fn attributes(&self) -> &[CacheAttribute] {
        &self.attributes
    }
}

fn validate_attributes(particle_count: usize, attributes: &[CacheAttribute]) -> Result<()> {
    let mut seen = HashSet::new();
    for attr in attributes {
        if attr.name.is_empty() {
            return Err(PartioError::InvalidCache("attribute with empty name".to_string()));
        }
        if !seen.insert(attr.name.as_str()) {
            return Err(PartioError::InvalidCache(format!(
                "duplicate attribute '{}'",
                attr.name
            )));
        }
        if attr.count == 0 {
            return Err(PartioError::InvalidCache(format!(
                "attribute '{}' has zero components",
                attr.name
            )));
        }
        let expected = attr.count * particle_count;
        if attr.data.len() != expected {
            return Err(PartioError::InvalidCache(format!(
                "attribute '{}' has {} values, expected {} ({} particles x {} components)",
                attr.name,
                attr.data.len(),
                expected,
                particle_count,
                attr.count
            )));
        }
    }
    Ok(())
}

impl ParticleSource for ParticleCache {
    fn num_particles(&self) -> usize {
        self.particle_count
    }

    fn attribute_info(&self, name: &str) -> Option<AttributeRef> {
        self.attributes
            .iter()
            .position(|attr| attr.name == name)
            .map(|index| {
                let attr = &self.attributes[index];
                AttributeRef::new(attr.name.clone(), attr.attr_type, attr.count, index)
            })
    }

    fn data(&self, attr: &AttributeRef, particle: usize) -> &[f32] {
        let stored = &self.attributes[attr.index];
        let start = particle * stored.count;
        &stored.data[start..start + stored.count]
    }
}

/// Incremental in-memory construction of a `ParticleCache`.
#[derive(Debug)]
pub struct ParticleCacheBuilder {
    particle_count: usize,
    attributes: Vec<CacheAttribute>,
}

impl ParticleCacheBuilder {
    /// Add a one-component float attribute.
    pub fn float(self, name: &str, values: Vec<f32>) -> Self {
        self.raw(name, AttributeType::Float, 1, values)
    }

    /// Add a three-component vector attribute.
    pub fn vector(self, name: &str, values: Vec<[f32; 3]>) -> Self {
        let data = values.into_iter().flatten().collect();
        self.raw(name, AttributeType::Vector, 3, data)
    }

    /// Add an attribute with an arbitrary component count.
    pub fn raw(mut self, name: &str, attr_type: AttributeType, count: usize, data: Vec<f32>) -> Self {
        self.attributes.push(CacheAttribute {
            name: name.to_string(),
            attr_type,
            count,
            data,
        });
        self
    }

    /// Validate and finish the cache.
    pub fn build(self) -> Result<ParticleCache> {
        ParticleCache::from_parts(self.particle_count, self.attributes)
    }
}
