use thiserror::Error;

use super::structs::PixelFormat;

/// Every failure the compute layer can report.
///
/// All of these are synchronous and local to the offending call; the
/// handle or manager state is left untouched by a failed validation.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// Host data does not match the resource's declared shape.
    #[error("data size {got} does not match resource size {expected}")]
    Size { expected: usize, got: usize },

    /// A dimension is zero or exceeds the per-rank maximum.
    #[error("{axis} extent {got} is outside the supported range 1..={max}")]
    Extent {
        axis: &'static str,
        got: usize,
        max: usize,
    },

    /// A resource's dimensions disagree with the dimensions cached from
    /// the first resource of the same family loaded into a manager.
    #[error("{family} dimensions do not match the previously loaded {family}")]
    SizeMismatch { family: &'static str },

    /// Element or slot index out of range.
    #[error("index {index} out of bounds for length {len}")]
    Index { index: usize, len: usize },

    /// Access to a handle whose shape was never set.
    #[error("resource has not been initialized")]
    Init,

    /// Access to a handle after its device resource was released.
    #[error("resource was already freed")]
    Free,

    /// Buffers require exactly one scalar component per element.
    #[error("buffer elements must have exactly one component, got {components}")]
    Component { components: u32 },

    /// An explicit pixel format disagrees with the element type's size.
    #[error("pixel format {format:?} does not describe a {size}-byte element")]
    Type { format: PixelFormat, size: usize },

    /// A library path or kernel entry point could not be resolved.
    #[error("could not load {what} `{name}`")]
    Load { what: &'static str, name: String },

    /// A texture accessor was called for the wrong rank.
    #[error("texture is rank {got}, expected rank {expected}")]
    Rank { expected: usize, got: usize },

    /// Dispatch was attempted with no bound buffers or textures.
    #[error("no buffers or textures loaded")]
    NoResource,

    /// A fault in the underlying device capability (stale handle,
    /// exhausted handle table, ...).
    #[error("backend error: {0}")]
    Backend(&'static str),
}

/// Convenient crate-wide result type.
pub type Result<T, E = ComputeError> = std::result::Result<T, E>;
