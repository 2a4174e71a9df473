use crate::utils::Handle;

use super::buffer::Buffer;
use super::device::{Bindings, CommandQueue, Device, Pipeline};
use super::element::Element;
use super::error::{ComputeError, Result};
use super::kernel::Kernel;
use super::structs::{Extent, GridSize, MAX_BUFFER_SLOTS, MAX_TEXTURE_SLOTS};
use super::texture::Texture;

/// Binds buffers and textures to fixed slot tables, sizes the dispatch
/// grid from their shapes, and issues one synchronous dispatch at a
/// time.
///
/// The first resource of each family pins that family's dimensions;
/// every later load must match them exactly until the family is reset.
/// Loading into an occupied slot replaces it (last write wins) and
/// reports that the slot was occupied.
pub struct CommandManager<T: Element> {
    device: Device,
    queue: Handle<CommandQueue>,
    pipeline: Option<Handle<Pipeline>>,
    buffers: Vec<Option<Buffer<T>>>,
    textures: Vec<Option<Texture<T>>>,
    buffer_length: Option<usize>,
    texture_extent: Option<Extent>,
}

impl<T: Element> CommandManager<T> {
    /// Create a manager bound to one device and one kernel. The
    /// kernel's current pipeline is cached and refreshed lazily on
    /// dispatch.
    pub fn new(device: &Device, kernel: &Kernel) -> Result<Self> {
        let queue = device.make_queue()?;
        Ok(Self {
            device: device.clone(),
            queue,
            pipeline: kernel.pipeline(),
            buffers: (0..MAX_BUFFER_SLOTS).map(|_| None).collect(),
            textures: (0..MAX_TEXTURE_SLOTS).map(|_| None).collect(),
            buffer_length: None,
            texture_extent: None,
        })
    }

    /// Bind `buffer` at `slot`. Returns whether the slot was previously
    /// occupied.
    pub fn load_buffer(&mut self, buffer: &Buffer<T>, slot: usize) -> Result<bool> {
        if slot >= MAX_BUFFER_SLOTS {
            return Err(ComputeError::Index {
                index: slot,
                len: MAX_BUFFER_SLOTS,
            });
        }
        if buffer.is_freed() {
            return Err(ComputeError::Free);
        }
        let length = buffer.length().ok_or(ComputeError::Init)?;

        match self.buffer_length {
            None => self.buffer_length = Some(length),
            Some(cached) if cached != length => {
                return Err(ComputeError::SizeMismatch { family: "buffer" });
            }
            Some(_) => {}
        }

        let occupied = self.buffers[slot].is_some();
        self.buffers[slot] = Some(buffer.alias());
        Ok(occupied)
    }

    /// Bind `texture` at `slot`. The extent must match the cached
    /// texture dimensions exactly, including rank, and is re-checked
    /// against the per-rank maxima. Returns whether the slot was
    /// previously occupied.
    pub fn load_texture(&mut self, texture: &Texture<T>, slot: usize) -> Result<bool> {
        if slot >= MAX_TEXTURE_SLOTS {
            return Err(ComputeError::Index {
                index: slot,
                len: MAX_TEXTURE_SLOTS,
            });
        }
        if texture.is_freed() {
            return Err(ComputeError::Free);
        }
        let extent = texture.extent().ok_or(ComputeError::Init)?;
        extent.validate()?;

        match self.texture_extent {
            None => self.texture_extent = Some(extent),
            Some(cached) if cached != extent => {
                return Err(ComputeError::SizeMismatch { family: "texture" });
            }
            Some(_) => {}
        }

        let occupied = self.textures[slot].is_some();
        self.textures[slot] = Some(texture.alias());
        Ok(occupied)
    }

    /// Bind every occupied slot to the kernel's pipeline, compute the
    /// grid from the cached dimensions, submit, and block until the
    /// device completes. Fails before any device work when nothing is
    /// bound or when the kernel has no compiled pipeline.
    pub fn dispatch(&mut self, kernel: &Kernel) -> Result<()> {
        // Refresh the cached pipeline if the kernel switched functions.
        if kernel.pipeline() != self.pipeline {
            self.pipeline = kernel.pipeline();
        }
        let pipeline = self.pipeline.ok_or(ComputeError::Load {
            what: "pipeline",
            name: kernel.entry_point().unwrap_or("<none>").to_string(),
        })?;

        let mut bindings = Bindings::default();
        for (slot, buffer) in self.buffers.iter().enumerate() {
            if let Some(handle) = buffer.as_ref().and_then(|b| b.device_handle()) {
                bindings.buffers.push((slot, handle));
            }
        }
        for (slot, texture) in self.textures.iter().enumerate() {
            if let Some(handle) = texture.as_ref().and_then(|t| t.device_handle()) {
                bindings.textures.push((slot, handle));
            }
        }

        let grid = self.grid_size(&bindings)?;
        let group = self.device.pipeline_properties(pipeline)?.group_size();

        log::trace!(
            "dispatching {}x{}x{} threads across {} buffers and {} textures",
            grid.width,
            grid.height,
            grid.depth,
            bindings.buffers.len(),
            bindings.textures.len(),
        );
        self.device
            .submit(self.queue, pipeline, &bindings, grid, group)
    }

    /// Grid sizing: the buffer family contributes its length along x;
    /// the texture family contributes its full extent; with both
    /// present the wider of the two wins along x.
    fn grid_size(&self, bindings: &Bindings) -> Result<GridSize> {
        let using_buffers = !bindings.buffers.is_empty();
        let using_textures = !bindings.textures.is_empty();

        match (using_buffers, using_textures) {
            (true, true) => {
                let length = self.buffer_length.unwrap_or(0);
                let extent = self.texture_extent.ok_or(ComputeError::NoResource)?;
                Ok(GridSize::new(
                    length.max(extent.width()),
                    extent.height(),
                    extent.depth(),
                ))
            }
            (true, false) => Ok(GridSize::new(self.buffer_length.unwrap_or(0), 1, 1)),
            (false, true) => {
                let extent = self.texture_extent.ok_or(ComputeError::NoResource)?;
                Ok(GridSize::new(
                    extent.width(),
                    extent.height(),
                    extent.depth(),
                ))
            }
            (false, false) => Err(ComputeError::NoResource),
        }
    }

    /// Unbind every buffer slot and forget the cached length. The
    /// handles themselves stay valid.
    pub fn reset_buffers(&mut self) {
        for slot in &mut self.buffers {
            *slot = None;
        }
        self.buffer_length = None;
    }

    /// Unbind every texture slot and forget the cached extent.
    pub fn reset_textures(&mut self) {
        for slot in &mut self.textures {
            *slot = None;
        }
        self.texture_extent = None;
    }

    pub fn reset(&mut self) {
        self.reset_buffers();
        self.reset_textures();
    }

    pub fn buffer(&self, slot: usize) -> Option<&Buffer<T>> {
        self.buffers.get(slot)?.as_ref()
    }

    pub fn texture(&self, slot: usize) -> Option<&Texture<T>> {
        self.textures.get(slot)?.as_ref()
    }

    pub fn buffer_length(&self) -> Option<usize> {
        self.buffer_length
    }

    pub fn texture_extent(&self) -> Option<Extent> {
        self.texture_extent
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl<T: Element> Drop for CommandManager<T> {
    fn drop(&mut self) {
        let _ = self.device.destroy_queue(self.queue);
    }
}
