use thiserror::Error;

use super::marker::Marker;

/// Failures raised while resolving filter names or arguments.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter `{name}` in filter list `{list}`")]
    UnknownFilter { name: String, list: String },
    #[error("invalid argument for filter `{name}`: {reason}")]
    InvalidFilterArgument { name: String, reason: String },
}

impl FilterError {
    pub fn unknown(name: impl Into<String>, list: impl Into<String>) -> Self {
        Self::UnknownFilter {
            name: name.into(),
            list: list.into(),
        }
    }

    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilterArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Failures raised while rendering content, applying filters or flushing.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("deferred producer #{position} failed")]
    DeferredProducer {
        marker: Marker,
        position: usize,
        #[source]
        source: Box<RenderError>,
    },
    #[error("component failed: {message}")]
    Component { message: String },
    #[error("request already finished")]
    RequestFinished,
}

impl RenderError {
    pub fn component(message: impl Into<String>) -> Self {
        Self::Component {
            message: message.into(),
        }
    }

    pub(crate) fn deferred_producer(marker: Marker, position: usize, source: RenderError) -> Self {
        Self::DeferredProducer {
            marker,
            position,
            source: Box::new(source),
        }
    }

    /// Walk through deferred-producer wrappers to the failure that started it.
    pub fn root_cause(&self) -> &RenderError {
        let mut current = self;
        while let RenderError::DeferredProducer { source, .. } = current {
            current = source;
        }
        current
    }
}
