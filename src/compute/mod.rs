//! The compute layer: typed resource handles, kernels, and the slot-based
//! command manager that turns bound resources into one synchronous dispatch.

pub mod buffer;
pub mod command;
pub mod device;
pub mod element;
pub mod error;
pub mod facade;
pub mod kernel;
pub mod structs;
pub mod texture;

#[cfg(feature = "kiln-soft")]
pub mod soft;

pub use buffer::Buffer;
pub use command::CommandManager;
pub use device::{
    Bindings, CommandQueue, Device, DeviceBackend, DeviceBuffer, DeviceTexture, Pipeline,
    PipelineProperties, ShaderLibrary,
};
pub use element::Element;
pub use error::{ComputeError, Result};
pub use facade::Gpu;
pub use kernel::Kernel;
pub use structs::*;
pub use texture::Texture;

#[cfg(feature = "kiln-soft")]
pub use soft::{SoftDevice, SoftLibrary, ThreadArgs};
