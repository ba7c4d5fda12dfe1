//! Procedural lifecycle.
//!
//! The host drives one `PartioProcedural` per render-time instance:
//! `init` reads the host options and loads the cache, `get_node` produces the
//! points primitive, and dropping the procedural releases the cache. Every
//! failure is contained here; the worst outcome is an empty primitive.

use crate::cache::ParticleCache;
use crate::config::EmissionConfig;
use crate::diagnostics::Diagnostic;
use crate::emitter::{self, Emission};
use crate::params::HostParams;
use crate::resolver;

/// One render-time instance of the particle cache procedural.
#[derive(Debug)]
pub struct PartioProcedural {
    config: EmissionConfig,
    cache: Option<ParticleCache>,
    load_diagnostics: Vec<Diagnostic>,
}

impl PartioProcedural {
    /// Read the host options and load the cache they point at.
    pub fn init(params: &HostParams) -> Self {
        Self::with_config(EmissionConfig::from_params(params))
    }

    /// Load the cache named by an already built configuration.
    pub fn with_config(config: EmissionConfig) -> Self {
        let config = config.sanitized();
        log::info!("[partio] loading cache {}", config.cache_path.display());

        let mut load_diagnostics = Vec::new();
        let cache = match ParticleCache::load(&config.cache_path) {
            Ok(cache) => Some(cache),
            Err(err) => {
                load_diagnostics.push(Diagnostic::warn_from(&err));
                None
            }
        };

        Self {
            config,
            cache,
            load_diagnostics,
        }
    }

    /// Wrap an already loaded cache.
    pub fn from_cache(cache: ParticleCache, config: EmissionConfig) -> Self {
        Self {
            config: config.sanitized(),
            cache: Some(cache),
            load_diagnostics: Vec::new(),
        }
    }

    /// Whether a cache was loaded and emission can proceed.
    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    pub fn config(&self) -> &EmissionConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&ParticleCache> {
        self.cache.as_ref()
    }

    pub fn load_diagnostics(&self) -> &[Diagnostic] {
        &self.load_diagnostics
    }

    /// Number of nodes this procedural expands to.
    pub fn num_nodes(&self) -> usize {
        1
    }

    /// Produce a fresh points primitive.
    ///
    /// Never fails: a missing cache or position attribute yields an empty
    /// primitive whose diagnostics say why.
    pub fn get_node(&self) -> Emission {
        let mut diagnostics = self.load_diagnostics.clone();

        let Some(cache) = &self.cache else {
            return Emission::empty(&self.config, diagnostics);
        };

        match resolver::resolve(cache, &self.config) {
            Ok(bindings) => {
                let mut emission = emitter::emit(cache, &self.config, &bindings);
                diagnostics.append(&mut emission.diagnostics);
                emission.diagnostics = diagnostics;
                emission
            }
            Err(err) => {
                diagnostics.push(Diagnostic::warn_from(&err));
                Emission::empty(&self.config, diagnostics)
            }
        }
    }
}

impl Drop for PartioProcedural {
    fn drop(&mut self) {
        if self.cache.take().is_some() {
            log::debug!(
                "[partio] released cache {}",
                self.config.cache_path.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::params::ParamValue;

    #[test]
    fn test_missing_file_yields_empty_primitive() {
        let params = HostParams::new().with(
            "arg_file",
            ParamValue::Str("/definitely/not/here.0001.json".to_string()),
        );
        let procedural = PartioProcedural::init(&params);
        assert!(!procedural.is_loaded());
        assert_eq!(procedural.num_nodes(), 1);

        let emission = procedural.get_node();
        assert!(emission.primitive.is_empty());
        assert_eq!(emission.diagnostics.len(), 1);
        assert_eq!(emission.diagnostics[0].kind, DiagnosticKind::CacheFileNotFound);
    }

    #[test]
    fn test_missing_position_yields_empty_primitive() {
        let cache = ParticleCache::builder(4)
            .vector("P", vec![[0.0; 3]; 4])
            .build()
            .unwrap();
        let procedural = PartioProcedural::from_cache(cache, EmissionConfig::default());

        let emission = procedural.get_node();
        assert!(emission.primitive.is_empty());
        assert_eq!(emission.primitive.point_count, 0);
        assert_eq!(
            emission.diagnostics[0].kind,
            DiagnosticKind::MissingRequiredAttribute
        );
    }

    #[test]
    fn test_get_node_allocates_fresh_buffers() {
        let cache = ParticleCache::builder(2)
            .vector("position", vec![[0.0; 3], [1.0; 3]])
            .build()
            .unwrap();
        let procedural = PartioProcedural::from_cache(cache, EmissionConfig::default());

        let first = procedural.get_node();
        let second = procedural.get_node();
        assert_eq!(first, second);
        assert_eq!(first.primitive.point_count, 2);
    }
}
