use super::error::{ComputeError, Result};

#[cfg(feature = "kiln-serde")]
use serde::{Deserialize, Serialize};

/// Buffer binding slots available to one dispatch, matching typical
/// device binding-table limits.
pub const MAX_BUFFER_SLOTS: usize = 31;
/// Texture binding slots available to one dispatch.
pub const MAX_TEXTURE_SLOTS: usize = 128;

pub const MAX_TEXTURE_1D_EXTENT: usize = 16384;
pub const MAX_TEXTURE_2D_EXTENT: usize = 16384;
pub const MAX_TEXTURE_3D_EXTENT: usize = 2048;

/// Memory-visibility policy of a device allocation.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "kiln-serde", derive(Serialize, Deserialize))]
pub enum StorageMode {
    /// Host-visible, coherent. The default.
    #[default]
    Shared,
    /// Host-visible but explicitly synchronized; written ranges must be
    /// flushed before the next dispatch.
    Managed,
    /// Device-only.
    Private,
}

/// The closed set of device pixel formats a texture element can map to.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "kiln-serde", derive(Serialize, Deserialize))]
pub enum PixelFormat {
    R8Uint,
    R8Sint,
    R16Uint,
    R16Sint,
    R32Uint,
    R32Sint,
    #[default]
    R32Float,
    RG32Float,
    RGBA32Float,
}

impl PixelFormat {
    pub fn bytes_per_texel(&self) -> usize {
        match self {
            PixelFormat::R8Uint | PixelFormat::R8Sint => 1,
            PixelFormat::R16Uint | PixelFormat::R16Sint => 2,
            PixelFormat::R32Uint | PixelFormat::R32Sint | PixelFormat::R32Float => 4,
            PixelFormat::RG32Float => 8,
            PixelFormat::RGBA32Float => 16,
        }
    }
}

/// Texture shape, tagged by rank. Missing axes read as 1.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "kiln-serde", derive(Serialize, Deserialize))]
pub enum Extent {
    D1 { width: usize },
    D2 { width: usize, height: usize },
    D3 { width: usize, height: usize, depth: usize },
}

impl Extent {
    pub fn rank(&self) -> usize {
        match self {
            Extent::D1 { .. } => 1,
            Extent::D2 { .. } => 2,
            Extent::D3 { .. } => 3,
        }
    }

    pub fn width(&self) -> usize {
        match *self {
            Extent::D1 { width } | Extent::D2 { width, .. } | Extent::D3 { width, .. } => width,
        }
    }

    pub fn height(&self) -> usize {
        match *self {
            Extent::D1 { .. } => 1,
            Extent::D2 { height, .. } | Extent::D3 { height, .. } => height,
        }
    }

    pub fn depth(&self) -> usize {
        match *self {
            Extent::D1 { .. } | Extent::D2 { .. } => 1,
            Extent::D3 { depth, .. } => depth,
        }
    }

    pub fn texel_count(&self) -> usize {
        self.width() * self.height() * self.depth()
    }

    /// Check every axis against the rank-specific maximum. Runs at
    /// construction and again whenever a texture is loaded for dispatch.
    pub fn validate(&self) -> Result<()> {
        let max = match self {
            Extent::D1 { .. } => MAX_TEXTURE_1D_EXTENT,
            Extent::D2 { .. } => MAX_TEXTURE_2D_EXTENT,
            Extent::D3 { .. } => MAX_TEXTURE_3D_EXTENT,
        };
        for (axis, got) in [
            ("width", self.width()),
            ("height", self.height()),
            ("depth", self.depth()),
        ] {
            if got == 0 || got > max {
                return Err(ComputeError::Extent { axis, got, max });
            }
        }
        Ok(())
    }
}

/// Total number of threads launched along each grid axis.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "kiln-serde", derive(Serialize, Deserialize))]
pub struct GridSize {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl GridSize {
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// Allocation descriptor for a device-resident linear buffer.
#[derive(Hash, Clone, Copy, Debug)]
pub struct BufferAllocInfo<'a> {
    pub debug_name: &'a str,
    pub byte_size: usize,
    pub storage: StorageMode,
}

impl<'a> Default for BufferAllocInfo<'a> {
    fn default() -> Self {
        Self {
            debug_name: "",
            byte_size: 1024,
            storage: StorageMode::Shared,
        }
    }
}

/// Allocation descriptor for a device-resident N-D texture.
#[derive(Hash, Clone, Copy, Debug)]
pub struct TextureAllocInfo<'a> {
    pub debug_name: &'a str,
    pub extent: Extent,
    pub format: PixelFormat,
}

impl<'a> Default for TextureAllocInfo<'a> {
    fn default() -> Self {
        Self {
            debug_name: "",
            extent: Extent::D1 { width: 1 },
            format: PixelFormat::default(),
        }
    }
}
