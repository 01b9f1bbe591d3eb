/// Crate-wide result alias.
pub type StrataResult<T> = Result<T, StrataError>;

/// Errors surfaced by the composition engine.
///
/// Variants follow the recovery taxonomy used by the render walker:
///
/// - [`StrataError::InvalidGeometry`] is recovered locally (the draw is skipped).
/// - [`StrataError::Allocation`] and [`StrataError::Unsupported`] fall back when a fallback
///   exists, otherwise they propagate.
/// - [`StrataError::Protocol`] marks a broken push/pop contract.
/// - [`StrataError::UnboundedClip`] always propagates.
#[derive(thiserror::Error, Debug)]
pub enum StrataError {
    /// NaN, inverted or otherwise unusable geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A surface or buffer could not be allocated.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// The target lacks a required capability.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Push/pop imbalance or another broken calling contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An intermediate surface was requested for content with no finite bounds.
    #[error("unbounded clip: {0}")]
    UnboundedClip(String),

    /// A render target operation failed.
    #[error("target error: {0}")]
    Target(String),

    /// Configuration could not be parsed or validated.
    #[error("config error: {0}")]
    Config(String),

    /// Foreign error with its source preserved.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StrataError {
    /// Build an [`StrataError::InvalidGeometry`].
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Build an [`StrataError::Allocation`].
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build an [`StrataError::Unsupported`].
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Build an [`StrataError::Protocol`].
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Build an [`StrataError::UnboundedClip`].
    pub fn unbounded_clip(msg: impl Into<String>) -> Self {
        Self::UnboundedClip(msg.into())
    }

    /// Build an [`StrataError::Target`].
    pub fn target(msg: impl Into<String>) -> Self {
        Self::Target(msg.into())
    }

    /// Build an [`StrataError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// `true` for categories that have a local fallback (bad geometry, allocation, capability).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry(_) | Self::Allocation(_) | Self::Unsupported(_)
        )
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
