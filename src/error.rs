//! Error taxonomy for open requests
//!
//! Every failure degrades to "the requested window did not open"; manager
//! indices and the node pool stay consistent. Operations on stale handles are
//! not errors and never produce one of these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenError {
    /// A policy refused the open (instance ceiling, `NotOpen` dependency gate)
    #[error("window {window_id} rejected: {reason}")]
    Rejected { window_id: String, reason: String },

    /// The resource loader produced no renderable
    #[error("resource for window {window_id} is unavailable")]
    ResourceUnavailable { window_id: String },

    /// Unknown window type, resolver miss, dependency cycle
    #[error("configuration error for window {window_id}: {reason}")]
    Configuration { window_id: String, reason: String },

    /// Opening a dependency failed, so the dependent window was not opened
    #[error("dependency {dependency} of window {window_id} failed to open")]
    DependencyFailed {
        window_id: String,
        dependency: String,
        #[source]
        source: Box<OpenError>,
    },
}

impl OpenError {
    pub(crate) fn rejected(window_id: &str, reason: impl Into<String>) -> Self {
        OpenError::Rejected {
            window_id: window_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn configuration(window_id: &str, reason: impl Into<String>) -> Self {
        OpenError::Configuration {
            window_id: window_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn window_id(&self) -> &str {
        match self {
            OpenError::Rejected { window_id, .. }
            | OpenError::ResourceUnavailable { window_id }
            | OpenError::Configuration { window_id, .. }
            | OpenError::DependencyFailed { window_id, .. } => window_id,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, OpenError::Rejected { .. })
    }
}
