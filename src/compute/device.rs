use std::sync::Arc;

use crate::utils::Handle;

use super::error::Result;
use super::structs::{BufferAllocInfo, GridSize, TextureAllocInfo};

/// Marker for a device-resident linear buffer allocation.
#[derive(Debug, Clone, Copy)]
pub struct DeviceBuffer;

/// Marker for a device-resident N-D texture allocation.
#[derive(Debug, Clone, Copy)]
pub struct DeviceTexture;

/// Marker for a loaded kernel library.
#[derive(Debug, Clone, Copy)]
pub struct ShaderLibrary;

/// Marker for a compiled, dispatch-ready kernel entry point.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline;

/// Marker for a command submission queue.
#[derive(Debug, Clone, Copy)]
pub struct CommandQueue;

/// The two pipeline properties the dispatch sizing algorithm consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineProperties {
    pub thread_execution_width: usize,
    pub max_threads_per_group: usize,
}

impl PipelineProperties {
    /// Per-group size derived the way the dispatcher sizes threadgroups:
    /// one execution width wide, filled up to the group thread budget.
    pub fn group_size(&self) -> GridSize {
        let width = self.thread_execution_width.max(1);
        GridSize::new(width, (self.max_threads_per_group / width).max(1), 1)
    }
}

/// Slot-indexed resource bindings for one dispatch.
#[derive(Debug, Default, Clone)]
pub struct Bindings {
    pub buffers: Vec<(usize, Handle<DeviceBuffer>)>,
    pub textures: Vec<(usize, Handle<DeviceTexture>)>,
}

impl Bindings {
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() && self.textures.is_empty()
    }
}

/// The capabilities the compute layer consumes from an actual device:
/// byte-addressable memory, pipeline compilation, and synchronous
/// command submission. Backends implement this; everything above only
/// talks to [`Device`].
pub trait DeviceBackend: Send + Sync {
    // --- memory capability ---

    fn make_buffer(&self, info: &BufferAllocInfo) -> Result<Handle<DeviceBuffer>>;
    fn write_buffer(&self, buffer: Handle<DeviceBuffer>, offset: usize, bytes: &[u8])
        -> Result<()>;
    fn read_buffer(&self, buffer: Handle<DeviceBuffer>, offset: usize, out: &mut [u8])
        -> Result<()>;
    /// Mark a written byte range dirty for explicitly-synchronized
    /// storage so it becomes visible to the device.
    fn flush_buffer(&self, buffer: Handle<DeviceBuffer>, offset: usize, len: usize) -> Result<()>;
    fn destroy_buffer(&self, buffer: Handle<DeviceBuffer>) -> Result<()>;

    fn make_texture(&self, info: &TextureAllocInfo) -> Result<Handle<DeviceTexture>>;
    /// Replace the whole texture with `bytes`, laid out row-major, then
    /// depth-major.
    fn write_texture(&self, texture: Handle<DeviceTexture>, bytes: &[u8]) -> Result<()>;
    fn read_texture(&self, texture: Handle<DeviceTexture>, out: &mut [u8]) -> Result<()>;
    fn destroy_texture(&self, texture: Handle<DeviceTexture>) -> Result<()>;

    // --- pipeline capability ---

    fn load_library(&self, path: &str) -> Result<Handle<ShaderLibrary>>;
    /// Entry-point names in the order the library reports them.
    fn function_names(&self, library: Handle<ShaderLibrary>) -> Result<Vec<String>>;
    fn make_pipeline(
        &self,
        library: Handle<ShaderLibrary>,
        entry_point: &str,
    ) -> Result<Handle<Pipeline>>;
    fn pipeline_properties(&self, pipeline: Handle<Pipeline>) -> Result<PipelineProperties>;

    // --- submission capability ---

    fn make_queue(&self) -> Result<Handle<CommandQueue>>;
    fn destroy_queue(&self, queue: Handle<CommandQueue>) -> Result<()>;
    /// Bind every slot in `bindings`, dispatch `grid` threads in groups
    /// of `group`, and block until the device signals completion.
    fn submit(
        &self,
        queue: Handle<CommandQueue>,
        pipeline: Handle<Pipeline>,
        bindings: &Bindings,
        grid: GridSize,
        group: GridSize,
    ) -> Result<()>;
}

/// Cloneable facade over the selected [`DeviceBackend`].
///
/// Resource handles keep a clone of this; cloning shares the backend.
#[derive(Clone)]
pub struct Device {
    backend: Arc<dyn DeviceBackend>,
}

impl Device {
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Self {
        Self { backend }
    }

    /// The in-process software reference device.
    #[cfg(feature = "kiln-soft")]
    pub fn soft() -> Self {
        Self::new(Arc::new(super::soft::SoftDevice::new()))
    }

    pub fn backend(&self) -> &Arc<dyn DeviceBackend> {
        &self.backend
    }

    pub fn make_buffer(&self, info: &BufferAllocInfo) -> Result<Handle<DeviceBuffer>> {
        self.backend.make_buffer(info)
    }

    pub fn write_buffer(
        &self,
        buffer: Handle<DeviceBuffer>,
        offset: usize,
        bytes: &[u8],
    ) -> Result<()> {
        self.backend.write_buffer(buffer, offset, bytes)
    }

    pub fn read_buffer(
        &self,
        buffer: Handle<DeviceBuffer>,
        offset: usize,
        out: &mut [u8],
    ) -> Result<()> {
        self.backend.read_buffer(buffer, offset, out)
    }

    pub fn flush_buffer(
        &self,
        buffer: Handle<DeviceBuffer>,
        offset: usize,
        len: usize,
    ) -> Result<()> {
        self.backend.flush_buffer(buffer, offset, len)
    }

    pub fn destroy_buffer(&self, buffer: Handle<DeviceBuffer>) -> Result<()> {
        self.backend.destroy_buffer(buffer)
    }

    pub fn make_texture(&self, info: &TextureAllocInfo) -> Result<Handle<DeviceTexture>> {
        self.backend.make_texture(info)
    }

    pub fn write_texture(&self, texture: Handle<DeviceTexture>, bytes: &[u8]) -> Result<()> {
        self.backend.write_texture(texture, bytes)
    }

    pub fn read_texture(&self, texture: Handle<DeviceTexture>, out: &mut [u8]) -> Result<()> {
        self.backend.read_texture(texture, out)
    }

    pub fn destroy_texture(&self, texture: Handle<DeviceTexture>) -> Result<()> {
        self.backend.destroy_texture(texture)
    }

    pub fn load_library(&self, path: &str) -> Result<Handle<ShaderLibrary>> {
        self.backend.load_library(path)
    }

    pub fn function_names(&self, library: Handle<ShaderLibrary>) -> Result<Vec<String>> {
        self.backend.function_names(library)
    }

    pub fn make_pipeline(
        &self,
        library: Handle<ShaderLibrary>,
        entry_point: &str,
    ) -> Result<Handle<Pipeline>> {
        self.backend.make_pipeline(library, entry_point)
    }

    pub fn pipeline_properties(&self, pipeline: Handle<Pipeline>) -> Result<PipelineProperties> {
        self.backend.pipeline_properties(pipeline)
    }

    pub fn make_queue(&self) -> Result<Handle<CommandQueue>> {
        self.backend.make_queue()
    }

    pub fn destroy_queue(&self, queue: Handle<CommandQueue>) -> Result<()> {
        self.backend.destroy_queue(queue)
    }

    pub fn submit(
        &self,
        queue: Handle<CommandQueue>,
        pipeline: Handle<Pipeline>,
        bindings: &Bindings,
        grid: GridSize,
        group: GridSize,
    ) -> Result<()> {
        self.backend.submit(queue, pipeline, bindings, grid, group)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").finish_non_exhaustive()
    }
}
