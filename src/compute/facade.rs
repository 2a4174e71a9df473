use super::buffer::Buffer;
use super::command::CommandManager;
use super::device::Device;
use super::element::Element;
use super::error::{ComputeError, Result};
use super::kernel::Kernel;
use super::structs::StorageMode;
use super::texture::Texture;

/// Entry-point-oriented convenience over [`Kernel`] +
/// [`CommandManager`] for simple array and matrix workloads: load host
/// data into a slot, run the kernel, read a slot back.
pub struct Gpu<T: Element> {
    device: Device,
    kernel: Option<Kernel>,
    manager: Option<CommandManager<T>>,
}

impl<T: Element> Gpu<T> {
    pub fn new(device: &Device) -> Self {
        Self {
            device: device.clone(),
            kernel: None,
            manager: None,
        }
    }

    /// Load a kernel library and select an entry point; every data
    /// operation requires this to have happened first.
    pub fn load_kernel(&mut self, path: &str, entry_point: &str) -> Result<()> {
        let kernel = Kernel::with_function(&self.device, path, entry_point)?;
        self.manager = Some(CommandManager::new(&self.device, &kernel)?);
        self.kernel = Some(kernel);
        Ok(())
    }

    fn manager(&self) -> Result<&CommandManager<T>> {
        self.manager.as_ref().ok_or(ComputeError::Load {
            what: "kernel",
            name: "no kernel loaded".to_string(),
        })
    }

    fn manager_mut(&mut self) -> Result<&mut CommandManager<T>> {
        self.manager.as_mut().ok_or(ComputeError::Load {
            what: "kernel",
            name: "no kernel loaded".to_string(),
        })
    }

    /// Copy `data` into a fresh shared buffer bound at `slot`.
    pub fn load_array(&mut self, data: &[T], slot: usize) -> Result<()> {
        self.manager()?;
        let mut buffer = Buffer::new(&self.device, data.len(), StorageMode::Shared)?;
        buffer.write_from(data)?;
        self.manager_mut()?.load_buffer(&buffer, slot)?;
        Ok(())
    }

    /// Copy a row-major matrix into a fresh 2D texture bound at `slot`.
    pub fn load_matrix(&mut self, data: &[Vec<T>], slot: usize) -> Result<()> {
        self.manager()?;
        let height = data.len();
        let width = data.first().map(Vec::len).unwrap_or(0);
        let mut texture = Texture::d2(&self.device, width, height)?;
        texture.write_2d(data)?;
        self.manager_mut()?.load_texture(&texture, slot)?;
        Ok(())
    }

    /// Dispatch the loaded kernel over everything bound so far.
    pub fn run_kernel(&mut self) -> Result<()> {
        let kernel = self.kernel.as_ref().ok_or(ComputeError::Load {
            what: "kernel",
            name: "no kernel loaded".to_string(),
        })?;
        let manager = self.manager.as_mut().ok_or(ComputeError::Load {
            what: "kernel",
            name: "no kernel loaded".to_string(),
        })?;
        manager.dispatch(kernel)
    }

    /// Read back the buffer bound at `slot`.
    pub fn get_array(&self, slot: usize) -> Result<Vec<T>> {
        self.manager()?
            .buffer(slot)
            .ok_or(ComputeError::Index {
                index: slot,
                len: super::structs::MAX_BUFFER_SLOTS,
            })?
            .get_data()
    }

    /// Read back the 2D texture bound at `slot`.
    pub fn get_matrix(&self, slot: usize) -> Result<Vec<Vec<T>>> {
        self.manager()?
            .texture(slot)
            .ok_or(ComputeError::Index {
                index: slot,
                len: super::structs::MAX_TEXTURE_SLOTS,
            })?
            .read_2d()
    }

    /// Unbind everything and clear the cached dimensions.
    pub fn reset(&mut self) -> Result<()> {
        self.manager_mut()?.reset();
        Ok(())
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn kernel(&self) -> Option<&Kernel> {
        self.kernel.as_ref()
    }
}
