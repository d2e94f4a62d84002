//! Error types for schedule operations.
//!
//! Every fallible operation in the engine reports one of the kinds listed in
//! [`ErrorKind`]. Errors are local to the operation that detected them: a
//! failed operation never leaves a schedule partially mutated.

use std::fmt;

use crate::models::{Channel, Interval};

/// Result type for schedule operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structured context for schedule errors.
///
/// Records which operation failed and on which program, so that messages
/// coming out of deeply nested compositions remain traceable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "insert", "replace", "to_schedule")
    pub operation: Option<String>,
    /// Name of the schedule or block that was being modified
    pub target: Option<String>,
    /// Name of the component being added, if any
    pub component: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the name of the program being modified.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the name of the component being added.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn is_empty(&self) -> bool {
        self.operation.is_none()
            && self.target.is_none()
            && self.component.is_none()
            && self.details.is_none()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref target) = self.target {
            parts.push(format!("target={}", target));
        }
        if let Some(ref component) = self.component {
            parts.push(format!("component={}", component));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Two intervals would overlap on the same channel.
    Overlap,
    /// A negative or non-integral time value was used.
    Timing,
    /// The timeslot map drifted from the children it is derived from.
    Consistency,
    /// A deferred program cannot be scheduled yet.
    Scheduling,
    /// The representation cannot support the requested operation.
    Unsupported,
    /// Full resolution was requested while free parameters remain.
    Unbound,
    /// Configuration could not be read or parsed.
    Config,
    /// A persisted record could not be encoded or decoded.
    Serialization,
}

/// Error type for schedule operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An interval collides with an existing one on the same channel.
    #[error("Overlap error: interval {incoming} on channel {channel} overlaps with existing interval {existing} {context}")]
    Overlap {
        channel: Channel,
        existing: Interval,
        incoming: Interval,
        context: ErrorContext,
    },

    /// Replacing a child introduced an overlap.
    #[error("Replacement error: {message} {context}")]
    ReplacementOverlap {
        message: String,
        context: ErrorContext,
        #[source]
        source: Box<Error>,
    },

    /// Negative start times, negative or non-integral durations.
    #[error("Timing error: {message} {context}")]
    Timing {
        message: String,
        context: ErrorContext,
    },

    /// An interval expected in the timeslot map is missing.
    #[error("Consistency error: cannot find interval {interval} on channel {channel} {context}")]
    Consistency {
        channel: Channel,
        interval: Interval,
        context: ErrorContext,
    },

    /// Conversion of a deferred program while durations are unassigned.
    #[error("Scheduling error: {message} {context}")]
    Scheduling {
        message: String,
        context: ErrorContext,
    },

    /// Operation not supported by this representation.
    #[error("Unsupported operation: {message} {context}")]
    Unsupported {
        message: String,
        context: ErrorContext,
    },

    /// Free parameters remain after a substitution requiring full resolution.
    #[error("Unbound parameters: {} {context}", .parameters.join(", "))]
    Unbound {
        parameters: Vec<String>,
        context: ErrorContext,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding or decoding error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an overlap error without context.
    pub fn overlap(channel: Channel, existing: Interval, incoming: Interval) -> Self {
        Self::Overlap {
            channel,
            existing,
            incoming,
            context: ErrorContext::default(),
        }
    }

    /// Create a timing error.
    pub fn timing(message: impl Into<String>) -> Self {
        Self::Timing {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a consistency error.
    pub fn consistency(channel: Channel, interval: Interval) -> Self {
        Self::Consistency {
            channel,
            interval,
            context: ErrorContext::default(),
        }
    }

    /// Create a scheduling error.
    pub fn scheduling(message: impl Into<String>) -> Self {
        Self::Scheduling {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create an unbound-parameter error.
    pub fn unbound(parameters: Vec<String>) -> Self {
        Self::Unbound {
            parameters,
            context: ErrorContext::default(),
        }
    }

    /// Wrap an overlap caused by a replacement.
    pub fn replacement(message: impl Into<String>, source: Error) -> Self {
        Self::ReplacementOverlap {
            message: message.into(),
            context: ErrorContext::new("replace"),
            source: Box::new(source),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Overlap { .. } | Self::ReplacementOverlap { .. } => ErrorKind::Overlap,
            Self::Timing { .. } => ErrorKind::Timing,
            Self::Consistency { .. } => ErrorKind::Consistency,
            Self::Scheduling { .. } => ErrorKind::Scheduling,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Unbound { .. } => ErrorKind::Unbound,
            Self::Config(_) => ErrorKind::Config,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Get the error context if available.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Overlap { context, .. }
            | Self::ReplacementOverlap { context, .. }
            | Self::Timing { context, .. }
            | Self::Consistency { context, .. }
            | Self::Scheduling { context, .. }
            | Self::Unsupported { context, .. }
            | Self::Unbound { context, .. } => Some(context),
            Self::Config(_) | Self::Serialization(_) => None,
        }
    }

    /// Replace the context of this error, keeping its kind and payload.
    pub fn with_context(mut self, new_context: ErrorContext) -> Self {
        match &mut self {
            Self::Overlap { context, .. }
            | Self::ReplacementOverlap { context, .. }
            | Self::Timing { context, .. }
            | Self::Consistency { context, .. }
            | Self::Scheduling { context, .. }
            | Self::Unsupported { context, .. }
            | Self::Unbound { context, .. } => *context = new_context,
            Self::Config(_) | Self::Serialization(_) => {}
        }
        self
    }
}
