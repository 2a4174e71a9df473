use std::marker::PhantomData;
use std::sync::Arc;

use crate::utils::Handle;

use super::device::{Device, DeviceTexture};
use super::element::Element;
use super::error::{ComputeError, Result};
use super::structs::{Extent, PixelFormat, TextureAllocInfo};

#[derive(Debug)]
pub(crate) struct RawTexture {
    device: Device,
    handle: Handle<DeviceTexture>,
}

impl Drop for RawTexture {
    fn drop(&mut self) {
        let _ = self.device.destroy_texture(self.handle);
    }
}

/// A typed device-resident texture of rank 1, 2 or 3.
///
/// The rank lives in the [`Extent`] tag rather than in a type
/// hierarchy, so the command manager can match over it exhaustively.
/// Host data is exchanged as nested containers of exactly the declared
/// shape; internally everything is flattened row-major, then
/// depth-major.
#[derive(Debug)]
pub struct Texture<T: Element> {
    raw: Option<Arc<RawTexture>>,
    extent: Option<Extent>,
    format: PixelFormat,
    freed: bool,
    _marker: PhantomData<T>,
}

impl<T: Element> Default for Texture<T> {
    fn default() -> Self {
        Self {
            raw: None,
            extent: None,
            format: T::FORMAT,
            freed: false,
            _marker: PhantomData,
        }
    }
}

impl<T: Element> Texture<T> {
    fn alloc(device: &Device, extent: Extent, format: PixelFormat) -> Result<Self> {
        extent.validate()?;
        if format.bytes_per_texel() != std::mem::size_of::<T>() {
            return Err(ComputeError::Type {
                format,
                size: std::mem::size_of::<T>(),
            });
        }

        let handle = device.make_texture(&TextureAllocInfo {
            debug_name: "texture",
            extent,
            format,
        })?;

        Ok(Self {
            raw: Some(Arc::new(RawTexture {
                device: device.clone(),
                handle,
            })),
            extent: Some(extent),
            format,
            freed: false,
            _marker: PhantomData,
        })
    }

    /// 1D texture with the pixel format inferred from `T`.
    pub fn d1(device: &Device, width: usize) -> Result<Self> {
        Self::alloc(device, Extent::D1 { width }, T::FORMAT)
    }

    /// 2D texture with the pixel format inferred from `T`.
    pub fn d2(device: &Device, width: usize, height: usize) -> Result<Self> {
        Self::alloc(device, Extent::D2 { width, height }, T::FORMAT)
    }

    /// 3D texture with the pixel format inferred from `T`.
    pub fn d3(device: &Device, width: usize, height: usize, depth: usize) -> Result<Self> {
        Self::alloc(
            device,
            Extent::D3 {
                width,
                height,
                depth,
            },
            T::FORMAT,
        )
    }

    /// 1D texture with an explicit format; its texel size must agree
    /// with `size_of::<T>()`.
    pub fn d1_with_format(device: &Device, width: usize, format: PixelFormat) -> Result<Self> {
        Self::alloc(device, Extent::D1 { width }, format)
    }

    pub fn d2_with_format(
        device: &Device,
        width: usize,
        height: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        Self::alloc(device, Extent::D2 { width, height }, format)
    }

    pub fn d3_with_format(
        device: &Device,
        width: usize,
        height: usize,
        depth: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        Self::alloc(
            device,
            Extent::D3 {
                width,
                height,
                depth,
            },
            format,
        )
    }

    fn check_freed(&self) -> Result<()> {
        if self.freed {
            return Err(ComputeError::Free);
        }
        Ok(())
    }

    fn raw(&self) -> Result<&Arc<RawTexture>> {
        self.check_freed()?;
        self.raw.as_ref().ok_or(ComputeError::Init)
    }

    fn extent_of_rank(&self, rank: usize) -> Result<Extent> {
        let extent = self.extent.ok_or(ComputeError::Init)?;
        if extent.rank() != rank {
            return Err(ComputeError::Rank {
                expected: rank,
                got: extent.rank(),
            });
        }
        Ok(extent)
    }

    fn write_flat(&self, flat: &[T]) -> Result<()> {
        let raw = self.raw()?;
        raw.device
            .write_texture(raw.handle, bytemuck::cast_slice(flat))
    }

    fn read_flat(&self) -> Result<Vec<T>> {
        let raw = self.raw()?;
        let extent = self.extent.ok_or(ComputeError::Init)?;
        let mut flat = vec![T::zeroed(); extent.texel_count()];
        raw.device
            .read_texture(raw.handle, bytemuck::cast_slice_mut(&mut flat))?;
        Ok(flat)
    }

    /// Replace a rank-1 texture's contents.
    pub fn write_1d(&mut self, data: &[T]) -> Result<()> {
        self.check_freed()?;
        let extent = self.extent_of_rank(1)?;
        extent.validate()?;
        if data.len() != extent.width() {
            return Err(ComputeError::Size {
                expected: extent.width(),
                got: data.len(),
            });
        }
        self.write_flat(data)
    }

    /// Replace a rank-2 texture's contents from rows. Every row must
    /// match the declared width exactly.
    pub fn write_2d(&mut self, rows: &[Vec<T>]) -> Result<()> {
        self.check_freed()?;
        let extent = self.extent_of_rank(2)?;
        extent.validate()?;
        let flat = flatten_2d(rows, extent.width(), extent.height())?;
        self.write_flat(&flat)
    }

    /// Replace a rank-3 texture's contents from depth-major planes of
    /// rows.
    pub fn write_3d(&mut self, planes: &[Vec<Vec<T>>]) -> Result<()> {
        self.check_freed()?;
        let extent = self.extent_of_rank(3)?;
        extent.validate()?;
        if planes.len() != extent.depth() {
            return Err(ComputeError::Size {
                expected: extent.depth(),
                got: planes.len(),
            });
        }
        let mut flat = Vec::with_capacity(extent.texel_count());
        for plane in planes {
            flat.extend(flatten_2d(plane, extent.width(), extent.height())?);
        }
        self.write_flat(&flat)
    }

    /// Full contents of a rank-1 texture.
    pub fn read_1d(&self) -> Result<Vec<T>> {
        self.check_freed()?;
        self.extent_of_rank(1)?;
        self.read_flat()
    }

    /// Full contents of a rank-2 texture as rows.
    pub fn read_2d(&self) -> Result<Vec<Vec<T>>> {
        self.check_freed()?;
        let extent = self.extent_of_rank(2)?;
        Ok(unflatten_2d(
            &self.read_flat()?,
            extent.width(),
            extent.height(),
        ))
    }

    /// Full contents of a rank-3 texture as planes of rows.
    pub fn read_3d(&self) -> Result<Vec<Vec<Vec<T>>>> {
        self.check_freed()?;
        let extent = self.extent_of_rank(3)?;
        let flat = self.read_flat()?;
        let plane_len = extent.width() * extent.height();
        Ok(flat
            .chunks(plane_len)
            .map(|plane| unflatten_2d(plane, extent.width(), extent.height()))
            .collect())
    }

    /// Scalar element of a rank-1 texture.
    pub fn get(&self, index: usize) -> Result<T> {
        self.check_freed()?;
        let extent = self.extent_of_rank(1)?;
        if index >= extent.width() {
            return Err(ComputeError::Index {
                index,
                len: extent.width(),
            });
        }
        Ok(self.read_flat()?[index])
    }

    /// One row of a rank-2 texture.
    pub fn row(&self, y: usize) -> Result<Vec<T>> {
        self.check_freed()?;
        let extent = self.extent_of_rank(2)?;
        if y >= extent.height() {
            return Err(ComputeError::Index {
                index: y,
                len: extent.height(),
            });
        }
        let flat = self.read_flat()?;
        let width = extent.width();
        Ok(flat[y * width..(y + 1) * width].to_vec())
    }

    /// One plane of a rank-3 texture, as rows.
    pub fn plane(&self, z: usize) -> Result<Vec<Vec<T>>> {
        self.check_freed()?;
        let extent = self.extent_of_rank(3)?;
        if z >= extent.depth() {
            return Err(ComputeError::Index {
                index: z,
                len: extent.depth(),
            });
        }
        let flat = self.read_flat()?;
        let plane_len = extent.width() * extent.height();
        Ok(unflatten_2d(
            &flat[z * plane_len..(z + 1) * plane_len],
            extent.width(),
            extent.height(),
        ))
    }

    /// A second handle to the same device texture.
    pub fn alias(&self) -> Texture<T> {
        Texture {
            raw: self.raw.clone(),
            extent: self.extent,
            format: self.format,
            freed: self.freed,
            _marker: PhantomData,
        }
    }

    /// Release this handle's share of the device resource. Idempotent;
    /// applies to never-initialized handles too.
    pub fn free(&mut self) {
        self.raw = None;
        self.freed = true;
    }

    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    pub fn rank(&self) -> Option<usize> {
        self.extent.map(|e| e.rank())
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn is_freed(&self) -> bool {
        self.freed
    }

    pub(crate) fn device_handle(&self) -> Option<Handle<DeviceTexture>> {
        self.raw.as_ref().map(|raw| raw.handle)
    }
}

fn flatten_2d<T: Element>(rows: &[Vec<T>], width: usize, height: usize) -> Result<Vec<T>> {
    if rows.len() != height {
        return Err(ComputeError::Size {
            expected: height,
            got: rows.len(),
        });
    }
    let mut flat = Vec::with_capacity(width * height);
    for row in rows {
        if row.len() != width {
            return Err(ComputeError::Size {
                expected: width,
                got: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }
    Ok(flat)
}

fn unflatten_2d<T: Element>(flat: &[T], width: usize, height: usize) -> Vec<Vec<T>> {
    let mut rows = Vec::with_capacity(height);
    for y in 0..height {
        rows.push(flat[y * width..(y + 1) * width].to_vec());
    }
    rows
}
