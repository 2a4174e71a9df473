use bytemuck::Pod;

use super::structs::PixelFormat;

/// Closed mapping from host element types to device pixel formats.
///
/// Only the types listed here can live in a [`Buffer`](super::Buffer) or
/// [`Texture`](super::Texture); anything else is rejected at compile
/// time rather than through runtime type identity checks. Compound
/// elements (more than one component) are texture-only.
pub trait Element: Pod + Send + Sync + 'static {
    const FORMAT: PixelFormat;
    const COMPONENTS: u32;
}

impl Element for u8 {
    const FORMAT: PixelFormat = PixelFormat::R8Uint;
    const COMPONENTS: u32 = 1;
}

impl Element for i8 {
    const FORMAT: PixelFormat = PixelFormat::R8Sint;
    const COMPONENTS: u32 = 1;
}

impl Element for u16 {
    const FORMAT: PixelFormat = PixelFormat::R16Uint;
    const COMPONENTS: u32 = 1;
}

impl Element for i16 {
    const FORMAT: PixelFormat = PixelFormat::R16Sint;
    const COMPONENTS: u32 = 1;
}

impl Element for u32 {
    const FORMAT: PixelFormat = PixelFormat::R32Uint;
    const COMPONENTS: u32 = 1;
}

impl Element for i32 {
    const FORMAT: PixelFormat = PixelFormat::R32Sint;
    const COMPONENTS: u32 = 1;
}

impl Element for f32 {
    const FORMAT: PixelFormat = PixelFormat::R32Float;
    const COMPONENTS: u32 = 1;
}

impl Element for [f32; 2] {
    const FORMAT: PixelFormat = PixelFormat::RG32Float;
    const COMPONENTS: u32 = 2;
}

impl Element for [f32; 4] {
    const FORMAT: PixelFormat = PixelFormat::RGBA32Float;
    const COMPONENTS: u32 = 4;
}
