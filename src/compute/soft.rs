//! In-process software backend.
//!
//! Interprets dispatches on the host instead of a real device: every
//! grid thread runs a registered closure with read/write access to the
//! bound slots. Used by the test suite and by headless hosts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytemuck::Pod;

use crate::utils::{Handle, Pool};

use super::device::{
    Bindings, CommandQueue, DeviceBackend, DeviceBuffer, DeviceTexture, Pipeline,
    PipelineProperties, ShaderLibrary,
};
use super::error::{ComputeError, Result};
use super::structs::{
    BufferAllocInfo, Extent, GridSize, PixelFormat, StorageMode, TextureAllocInfo,
    MAX_BUFFER_SLOTS, MAX_TEXTURE_SLOTS,
};

/// One entry point of a [`SoftLibrary`], invoked once per grid thread.
pub type KernelFn = Arc<dyn Fn(&mut ThreadArgs) + Send + Sync>;

/// A named, ordered collection of host-side kernel functions standing
/// in for a compiled library.
#[derive(Default, Clone)]
pub struct SoftLibrary {
    functions: Vec<(String, KernelFn)>,
}

impl SoftLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry point. Order is preserved and reported by
    /// `function_names`.
    pub fn function(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&mut ThreadArgs) + Send + Sync + 'static,
    ) -> Self {
        self.functions.push((name.into(), Arc::new(f)));
        self
    }

    fn get(&self, name: &str) -> Option<&KernelFn> {
        self.functions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }

    fn names(&self) -> Vec<String> {
        self.functions.iter().map(|(n, _)| n.clone()).collect()
    }
}

struct SoftBuffer {
    bytes: Vec<u8>,
    storage: StorageMode,
    dirty: Vec<(usize, usize)>,
}

struct SoftTexture {
    bytes: Vec<u8>,
    extent: Extent,
    format: PixelFormat,
}

struct SoftPipeline {
    entry_point: String,
    function: KernelFn,
}

#[derive(Default)]
struct SoftQueue {
    completed: u64,
}

/// Software implementation of every [`DeviceBackend`] capability.
pub struct SoftDevice {
    buffers: Mutex<Pool<SoftBuffer>>,
    textures: Mutex<Pool<SoftTexture>>,
    libraries: Mutex<Pool<SoftLibrary>>,
    registry: Mutex<HashMap<String, Handle<ShaderLibrary>>>,
    pipelines: Mutex<Pool<SoftPipeline>>,
    queues: Mutex<Pool<SoftQueue>>,
    properties: PipelineProperties,
}

impl Default for SoftDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftDevice {
    pub fn new() -> Self {
        Self::with_properties(PipelineProperties {
            thread_execution_width: 32,
            max_threads_per_group: 1024,
        })
    }

    /// Override the pipeline properties every compiled pipeline will
    /// report.
    pub fn with_properties(properties: PipelineProperties) -> Self {
        Self {
            buffers: Mutex::new(Pool::default()),
            textures: Mutex::new(Pool::default()),
            libraries: Mutex::new(Pool::new(64)),
            registry: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(Pool::new(256)),
            queues: Mutex::new(Pool::new(64)),
            properties,
        }
    }

    /// Make `library` loadable under the path-like name `path`.
    pub fn register_library(
        &self,
        path: impl Into<String>,
        library: SoftLibrary,
    ) -> Result<Handle<ShaderLibrary>> {
        let handle = self
            .libraries
            .lock()
            .expect("library pool lock poisoned")
            .insert(library)
            .ok_or(ComputeError::Backend("library pool exhausted"))?
            .retag();
        self.registry
            .lock()
            .expect("library registry lock poisoned")
            .insert(path.into(), handle);
        Ok(handle)
    }

    /// Byte ranges flushed for an explicitly-synchronized buffer, in
    /// the order they were marked dirty.
    pub fn flushed_ranges(&self, buffer: Handle<DeviceBuffer>) -> Result<Vec<(usize, usize)>> {
        self.buffers
            .lock()
            .expect("buffer pool lock poisoned")
            .get_ref(buffer.retag())
            .map(|b| b.dirty.clone())
            .ok_or(ComputeError::Backend("unknown device buffer"))
    }

    /// Number of dispatches this queue has completed.
    pub fn completed_dispatches(&self, queue: Handle<CommandQueue>) -> Result<u64> {
        self.queues
            .lock()
            .expect("queue pool lock poisoned")
            .get_ref(queue.retag())
            .map(|q| q.completed)
            .ok_or(ComputeError::Backend("unknown command queue"))
    }
}

impl DeviceBackend for SoftDevice {
    fn make_buffer(&self, info: &BufferAllocInfo) -> Result<Handle<DeviceBuffer>> {
        self.buffers
            .lock()
            .expect("buffer pool lock poisoned")
            .insert(SoftBuffer {
                bytes: vec![0; info.byte_size],
                storage: info.storage,
                dirty: Vec::new(),
            })
            .map(Handle::retag)
            .ok_or(ComputeError::Backend("buffer pool exhausted"))
    }

    fn write_buffer(
        &self,
        buffer: Handle<DeviceBuffer>,
        offset: usize,
        bytes: &[u8],
    ) -> Result<()> {
        let mut pool = self.buffers.lock().expect("buffer pool lock poisoned");
        let buf = pool
            .get_mut_ref(buffer.retag())
            .ok_or(ComputeError::Backend("unknown device buffer"))?;
        let end = offset + bytes.len();
        if end > buf.bytes.len() {
            return Err(ComputeError::Backend("buffer write out of bounds"));
        }
        buf.bytes[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: Handle<DeviceBuffer>,
        offset: usize,
        out: &mut [u8],
    ) -> Result<()> {
        let pool = self.buffers.lock().expect("buffer pool lock poisoned");
        let buf = pool
            .get_ref(buffer.retag())
            .ok_or(ComputeError::Backend("unknown device buffer"))?;
        let end = offset + out.len();
        if end > buf.bytes.len() {
            return Err(ComputeError::Backend("buffer read out of bounds"));
        }
        out.copy_from_slice(&buf.bytes[offset..end]);
        Ok(())
    }

    fn flush_buffer(&self, buffer: Handle<DeviceBuffer>, offset: usize, len: usize) -> Result<()> {
        let mut pool = self.buffers.lock().expect("buffer pool lock poisoned");
        let buf = pool
            .get_mut_ref(buffer.retag())
            .ok_or(ComputeError::Backend("unknown device buffer"))?;
        // Host memory is always coherent here; just record the range.
        if buf.storage == StorageMode::Managed {
            buf.dirty.push((offset, len));
        }
        Ok(())
    }

    fn destroy_buffer(&self, buffer: Handle<DeviceBuffer>) -> Result<()> {
        self.buffers
            .lock()
            .expect("buffer pool lock poisoned")
            .release(buffer.retag());
        Ok(())
    }

    fn make_texture(&self, info: &TextureAllocInfo) -> Result<Handle<DeviceTexture>> {
        let byte_size = info.extent.texel_count() * info.format.bytes_per_texel();
        self.textures
            .lock()
            .expect("texture pool lock poisoned")
            .insert(SoftTexture {
                bytes: vec![0; byte_size],
                extent: info.extent,
                format: info.format,
            })
            .map(Handle::retag)
            .ok_or(ComputeError::Backend("texture pool exhausted"))
    }

    fn write_texture(&self, texture: Handle<DeviceTexture>, bytes: &[u8]) -> Result<()> {
        let mut pool = self.textures.lock().expect("texture pool lock poisoned");
        let tex = pool
            .get_mut_ref(texture.retag())
            .ok_or(ComputeError::Backend("unknown device texture"))?;
        if bytes.len() != tex.bytes.len() {
            return Err(ComputeError::Size {
                expected: tex.bytes.len(),
                got: bytes.len(),
            });
        }
        tex.bytes.copy_from_slice(bytes);
        Ok(())
    }

    fn read_texture(&self, texture: Handle<DeviceTexture>, out: &mut [u8]) -> Result<()> {
        let pool = self.textures.lock().expect("texture pool lock poisoned");
        let tex = pool
            .get_ref(texture.retag())
            .ok_or(ComputeError::Backend("unknown device texture"))?;
        if out.len() != tex.bytes.len() {
            return Err(ComputeError::Size {
                expected: tex.bytes.len(),
                got: out.len(),
            });
        }
        out.copy_from_slice(&tex.bytes);
        Ok(())
    }

    fn destroy_texture(&self, texture: Handle<DeviceTexture>) -> Result<()> {
        self.textures
            .lock()
            .expect("texture pool lock poisoned")
            .release(texture.retag());
        Ok(())
    }

    fn load_library(&self, path: &str) -> Result<Handle<ShaderLibrary>> {
        self.registry
            .lock()
            .expect("library registry lock poisoned")
            .get(path)
            .copied()
            .ok_or_else(|| ComputeError::Load {
                what: "library",
                name: path.to_string(),
            })
    }

    fn function_names(&self, library: Handle<ShaderLibrary>) -> Result<Vec<String>> {
        self.libraries
            .lock()
            .expect("library pool lock poisoned")
            .get_ref(library.retag())
            .map(SoftLibrary::names)
            .ok_or(ComputeError::Backend("unknown shader library"))
    }

    fn make_pipeline(
        &self,
        library: Handle<ShaderLibrary>,
        entry_point: &str,
    ) -> Result<Handle<Pipeline>> {
        let function = {
            let pool = self.libraries.lock().expect("library pool lock poisoned");
            let lib = pool
                .get_ref(library.retag())
                .ok_or(ComputeError::Backend("unknown shader library"))?;
            lib.get(entry_point)
                .cloned()
                .ok_or_else(|| ComputeError::Load {
                    what: "function",
                    name: entry_point.to_string(),
                })?
        };

        self.pipelines
            .lock()
            .expect("pipeline pool lock poisoned")
            .insert(SoftPipeline {
                entry_point: entry_point.to_string(),
                function,
            })
            .map(Handle::retag)
            .ok_or(ComputeError::Backend("pipeline pool exhausted"))
    }

    fn pipeline_properties(&self, pipeline: Handle<Pipeline>) -> Result<PipelineProperties> {
        self.pipelines
            .lock()
            .expect("pipeline pool lock poisoned")
            .get_ref(pipeline.retag())
            .map(|_| self.properties)
            .ok_or(ComputeError::Backend("unknown pipeline"))
    }

    fn make_queue(&self) -> Result<Handle<CommandQueue>> {
        self.queues
            .lock()
            .expect("queue pool lock poisoned")
            .insert(SoftQueue::default())
            .map(Handle::retag)
            .ok_or(ComputeError::Backend("queue pool exhausted"))
    }

    fn destroy_queue(&self, queue: Handle<CommandQueue>) -> Result<()> {
        self.queues
            .lock()
            .expect("queue pool lock poisoned")
            .release(queue.retag());
        Ok(())
    }

    fn submit(
        &self,
        queue: Handle<CommandQueue>,
        pipeline: Handle<Pipeline>,
        bindings: &Bindings,
        grid: GridSize,
        group: GridSize,
    ) -> Result<()> {
        if group.width == 0 || group.height == 0 || group.depth == 0 {
            return Err(ComputeError::Backend("threadgroup size must be non-zero"));
        }

        let (entry_point, function) = {
            let pool = self.pipelines.lock().expect("pipeline pool lock poisoned");
            let pipeline = pool
                .get_ref(pipeline.retag())
                .ok_or(ComputeError::Backend("unknown pipeline"))?;
            (pipeline.entry_point.clone(), pipeline.function.clone())
        };
        self.queues
            .lock()
            .expect("queue pool lock poisoned")
            .get_ref(queue.retag())
            .ok_or(ComputeError::Backend("unknown command queue"))?;

        // Pull the bound resources out of the pools so each grid thread
        // gets unfettered byte access, then put them back afterwards.
        // The same handle may be bound at several slots; its bytes are
        // taken once and every referencing slot indexes the same entry.
        // Each family is validated and taken under one lock so a bad
        // binding rejects the whole submission before any bytes move.
        let mut buffer_handles: Vec<Handle<DeviceBuffer>> = Vec::new();
        let mut buffer_store: Vec<Vec<u8>> = Vec::new();
        let mut buffer_slots: Vec<Option<usize>> = vec![None; MAX_BUFFER_SLOTS];
        {
            let mut pool = self.buffers.lock().expect("buffer pool lock poisoned");
            for &(slot, handle) in &bindings.buffers {
                if slot >= MAX_BUFFER_SLOTS {
                    return Err(ComputeError::Index {
                        index: slot,
                        len: MAX_BUFFER_SLOTS,
                    });
                }
                pool.get_ref(handle.retag())
                    .ok_or(ComputeError::Backend("unknown device buffer"))?;
            }
            for &(slot, handle) in &bindings.buffers {
                let entry = match buffer_handles.iter().position(|&h| h == handle) {
                    Some(entry) => entry,
                    None => {
                        if let Some(buf) = pool.get_mut_ref(handle.retag()) {
                            buffer_handles.push(handle);
                            buffer_store.push(std::mem::take(&mut buf.bytes));
                        }
                        buffer_store.len() - 1
                    }
                };
                buffer_slots[slot] = Some(entry);
            }
        }

        let mut texture_handles: Vec<Handle<DeviceTexture>> = Vec::new();
        let mut texture_store: Vec<BoundTexture> = Vec::new();
        let mut texture_slots: Vec<Option<usize>> = vec![None; MAX_TEXTURE_SLOTS];
        {
            let mut pool = self.textures.lock().expect("texture pool lock poisoned");
            for &(slot, handle) in &bindings.textures {
                if slot >= MAX_TEXTURE_SLOTS {
                    return Err(ComputeError::Index {
                        index: slot,
                        len: MAX_TEXTURE_SLOTS,
                    });
                }
                pool.get_ref(handle.retag())
                    .ok_or(ComputeError::Backend("unknown device texture"))?;
            }
            for &(slot, handle) in &bindings.textures {
                let entry = match texture_handles.iter().position(|&h| h == handle) {
                    Some(entry) => entry,
                    None => {
                        if let Some(tex) = pool.get_mut_ref(handle.retag()) {
                            texture_handles.push(handle);
                            texture_store.push(BoundTexture {
                                bytes: std::mem::take(&mut tex.bytes),
                                extent: tex.extent,
                                format: tex.format,
                            });
                        }
                        texture_store.len() - 1
                    }
                };
                texture_slots[slot] = Some(entry);
            }
        }

        log::trace!(
            "soft dispatch of `{entry_point}`: grid {}x{}x{}, group {}x{}x{}",
            grid.width,
            grid.height,
            grid.depth,
            group.width,
            group.height,
            group.depth,
        );
        for z in 0..grid.depth {
            for y in 0..grid.height {
                for x in 0..grid.width {
                    let mut args = ThreadArgs {
                        gid: [x, y, z],
                        grid,
                        buffer_slots: &buffer_slots,
                        buffer_store: &mut buffer_store,
                        texture_slots: &texture_slots,
                        texture_store: &mut texture_store,
                    };
                    function(&mut args);
                }
            }
        }

        {
            let mut pool = self.buffers.lock().expect("buffer pool lock poisoned");
            for (handle, bytes) in buffer_handles.into_iter().zip(buffer_store) {
                if let Some(buf) = pool.get_mut_ref(handle.retag()) {
                    buf.bytes = bytes;
                }
            }
        }
        {
            let mut pool = self.textures.lock().expect("texture pool lock poisoned");
            for (handle, bound) in texture_handles.into_iter().zip(texture_store) {
                if let Some(tex) = pool.get_mut_ref(handle.retag()) {
                    tex.bytes = bound.bytes;
                }
            }
        }

        if let Some(q) = self
            .queues
            .lock()
            .expect("queue pool lock poisoned")
            .get_mut_ref(queue.retag())
        {
            q.completed += 1;
        }
        Ok(())
    }
}

struct BoundTexture {
    bytes: Vec<u8>,
    extent: Extent,
    format: PixelFormat,
}

/// Per-thread view of the bound slots handed to a [`KernelFn`].
///
/// Accessors panic on an unbound slot or out-of-range coordinate, the
/// moral equivalent of a device fault; host code validates shapes
/// before any dispatch reaches this point.
pub struct ThreadArgs<'a> {
    gid: [usize; 3],
    grid: GridSize,
    buffer_slots: &'a [Option<usize>],
    buffer_store: &'a mut [Vec<u8>],
    texture_slots: &'a [Option<usize>],
    texture_store: &'a mut [BoundTexture],
}

impl<'a> ThreadArgs<'a> {
    /// This thread's position in the grid.
    pub fn global_id(&self) -> [usize; 3] {
        self.gid
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    fn buffer_entry(&self, slot: usize) -> usize {
        self.buffer_slots[slot].unwrap_or_else(|| panic!("no buffer bound at slot {slot}"))
    }

    fn texture_entry(&self, slot: usize) -> usize {
        self.texture_slots[slot].unwrap_or_else(|| panic!("no texture bound at slot {slot}"))
    }

    /// Element count of the buffer at `slot`, viewed as `T`.
    pub fn buffer_len<T: Pod>(&self, slot: usize) -> usize {
        self.buffer_store[self.buffer_entry(slot)].len() / std::mem::size_of::<T>()
    }

    pub fn buffer_read<T: Pod>(&self, slot: usize, index: usize) -> T {
        let offset = index * std::mem::size_of::<T>();
        let bytes = &self.buffer_store[self.buffer_entry(slot)]
            [offset..offset + std::mem::size_of::<T>()];
        bytemuck::pod_read_unaligned(bytes)
    }

    pub fn buffer_write<T: Pod>(&mut self, slot: usize, index: usize, value: T) {
        let entry = self.buffer_entry(slot);
        let offset = index * std::mem::size_of::<T>();
        self.buffer_store[entry][offset..offset + std::mem::size_of::<T>()]
            .copy_from_slice(bytemuck::bytes_of(&value));
    }

    pub fn texture_extent(&self, slot: usize) -> Extent {
        self.texture_store[self.texture_entry(slot)].extent
    }

    pub fn texture_format(&self, slot: usize) -> PixelFormat {
        self.texture_store[self.texture_entry(slot)].format
    }

    pub fn texel_read<T: Pod>(&self, slot: usize, x: usize, y: usize, z: usize) -> T {
        let tex = &self.texture_store[self.texture_entry(slot)];
        let offset = texel_offset::<T>(tex.extent, x, y, z);
        bytemuck::pod_read_unaligned(&tex.bytes[offset..offset + std::mem::size_of::<T>()])
    }

    pub fn texel_write<T: Pod>(&mut self, slot: usize, x: usize, y: usize, z: usize, value: T) {
        let entry = self.texture_entry(slot);
        let tex = &mut self.texture_store[entry];
        let offset = texel_offset::<T>(tex.extent, x, y, z);
        tex.bytes[offset..offset + std::mem::size_of::<T>()]
            .copy_from_slice(bytemuck::bytes_of(&value));
    }
}

fn texel_offset<T>(extent: Extent, x: usize, y: usize, z: usize) -> usize {
    assert!(
        x < extent.width() && y < extent.height() && z < extent.depth(),
        "texel ({x}, {y}, {z}) outside extent {extent:?}"
    );
    ((z * extent.height() + y) * extent.width() + x) * std::mem::size_of::<T>()
}
