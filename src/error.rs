//! Error types
//!
//! Typed errors at the system boundary. DRM/GBM/EGL helpers below this
//! boundary use `anyhow` and are flattened into these variants.

use thiserror::Error;

use crate::framework::RegionConfigFlags;

/// Output discovery failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("cannot find a connected connector")]
    NoConnector,
    #[error("cannot find an encoder for the connector")]
    NoEncoder,
    #[error("cannot find a CRTC for the encoder")]
    NoCrtc,
    #[error("connector advertises no modes")]
    NoMode,
}

/// Per-process binding failures, one per acquisition step
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to open '{path}': {reason}")]
    OpenFailed { path: String, reason: String },
    #[error("buffer allocator initialization failed: {0}")]
    AllocatorInitFailed(String),
    #[error("rendering display initialization failed: {0}")]
    ContextInitFailed(String),
    #[error("no matching 8-8-8-8 display configuration: {0}")]
    NoDisplayConfig(String),
    #[error("output discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("window surface creation failed: {0}")]
    SurfaceCreateFailed(String),
    #[error("rendering context creation failed: {0}")]
    ContextCreateFailed(String),
    #[error("binding the rendering context failed: {0}")]
    MakeCurrentFailed(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("initialization failed: {0}")]
    Init(#[from] BindError),
    #[error("shared field '{0}' not found")]
    NotFound(String),
    #[error("shared memory {context}: {source}")]
    Shared {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("unsupported region configuration (failed: {0:?})")]
    Unsupported(RegionConfigFlags),
    #[error("surface pool: {0}")]
    SurfacePool(String),
    #[error("display output failed: {0}")]
    FatalDisplay(String),
}

impl Error {
    pub(crate) fn shared(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Shared {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
