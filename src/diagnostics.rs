//! Structured emission diagnostics.
//!
//! Every skipped attribute, constant fallback and sanitised particle is logged
//! through the `log` facade and also recorded as a `Diagnostic`, a stable,
//! JSON-serializable record that hosts can surface without access to the
//! process logs.

use serde::Serialize;

use crate::error::PartioError;

/// Maximum number of individually logged bad particles per emission pass.
pub const MAX_PARTICLE_WARNINGS: usize = 16;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Position is missing under every accepted name; the primitive is empty.
    MissingRequiredAttribute,
    /// An attribute has an element count that cannot be mapped.
    AttributeTypeUnsupported,
    /// An extra attribute names a reserved role or was already exported.
    AttributeNameCollision,
    /// An extra attribute names something the cache does not contain.
    AttributeNotFound,
    /// More extra attributes were requested than the primitive accepts.
    TooManyAttributes,
    /// The cache file is missing on disk.
    CacheFileNotFound,
    /// The cache file exists but could not be read or parsed.
    CacheUnreadable,
    /// One or more particles had a NaN or infinite position.
    NonFiniteValue,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build a diagnostic from an error and log it as a warning.
    pub fn warn_from(err: &PartioError) -> Self {
        let diagnostic = Self::from(err);
        log::warn!("[partio] {}", diagnostic.message);
        diagnostic
    }
}

impl From<&PartioError> for Diagnostic {
    fn from(err: &PartioError) -> Self {
        let kind = match err {
            PartioError::CacheFileNotFound(_) => DiagnosticKind::CacheFileNotFound,
            PartioError::Io(_) | PartioError::Json(_) | PartioError::InvalidCache(_) => {
                DiagnosticKind::CacheUnreadable
            }
            PartioError::MissingRequiredAttribute { .. } => DiagnosticKind::MissingRequiredAttribute,
            PartioError::AttributeTypeUnsupported { .. } => DiagnosticKind::AttributeTypeUnsupported,
            PartioError::AttributeNameCollision(_) => DiagnosticKind::AttributeNameCollision,
        };
        Self::new(kind, err.to_string())
    }
}

/// Per-pass counter for non-finite particles.
///
/// Logs the first `MAX_PARTICLE_WARNINGS` occurrences individually and folds
/// the rest into one summary so a corrupt cache cannot flood the render log.
#[derive(Debug, Default)]
pub struct BadParticleLog {
    count: usize,
}

impl BadParticleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a particle whose position was replaced by the origin.
    pub fn record(&mut self, index: usize, raw: [f32; 3]) {
        if self.count < MAX_PARTICLE_WARNINGS {
            log::warn!(
                "[partio] particle {} has non-finite position ({}, {}, {}), hiding it",
                index,
                raw[0],
                raw[1],
                raw[2]
            );
        } else if self.count == MAX_PARTICLE_WARNINGS {
            log::warn!(
                "[partio] more than {} non-finite particles, further warnings suppressed",
                MAX_PARTICLE_WARNINGS
            );
        }
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Summarise the pass, if any particle was bad.
    pub fn finish(self, point_count: usize) -> Option<Diagnostic> {
        if self.count == 0 {
            return None;
        }
        let message = format!(
            "{} of {} particles had non-finite positions and were hidden at the origin",
            self.count, point_count
        );
        if self.count > MAX_PARTICLE_WARNINGS {
            log::warn!("[partio] {}", message);
        }
        Some(Diagnostic::new(DiagnosticKind::NonFiniteValue, message))
    }
}
