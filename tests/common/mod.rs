#![allow(dead_code)]

use std::sync::Arc;

use kiln::*;

pub const LIB_PATH: &str = "kernels.klib";

/// A soft device preloaded with the kernels the integration tests
/// dispatch.
pub fn test_device() -> (Arc<SoftDevice>, Device) {
    let _ = env_logger::builder().is_test(true).try_init();

    let soft = Arc::new(SoftDevice::new());
    soft.register_library(LIB_PATH, test_library())
        .expect("register test library");
    let device = Device::new(soft.clone());
    (soft, device)
}

fn test_library() -> SoftLibrary {
    SoftLibrary::new()
        // out[i] = in[i]
        .function("copy", |args| {
            let i = args.global_id()[0];
            if i < args.buffer_len::<f32>(0) {
                let v: f32 = args.buffer_read(0, i);
                args.buffer_write(1, i, v);
            }
        })
        // out[i] = a[i] + b[i]
        .function("add_arrays", |args| {
            let i = args.global_id()[0];
            if i < args.buffer_len::<f32>(2) {
                let a: f32 = args.buffer_read(0, i);
                let b: f32 = args.buffer_read(1, i);
                args.buffer_write(2, i, a + b);
            }
        })
        // out[i] = in[i] * 2
        .function("scale", |args| {
            let i = args.global_id()[0];
            if i < args.buffer_len::<f32>(0) {
                let v: f32 = args.buffer_read(0, i);
                args.buffer_write(1, i, v * 2.0);
            }
        })
        // out[xyz] = a[xyz] + b[xyz], any texture rank
        .function("add_textures", |args| {
            let [x, y, z] = args.global_id();
            let extent = args.texture_extent(2);
            if x < extent.width() && y < extent.height() && z < extent.depth() {
                let a: f32 = args.texel_read(0, x, y, z);
                let b: f32 = args.texel_read(1, x, y, z);
                args.texel_write(2, x, y, z, a + b);
            }
        })
        // out_buffer[i] = in_buffer[i] + tex[x0]; exercises a combined
        // buffer + texture grid
        .function("offset_by_texel", |args| {
            let i = args.global_id()[0];
            if args.global_id()[1] == 0
                && args.global_id()[2] == 0
                && i < args.buffer_len::<f32>(1)
            {
                let extent = args.texture_extent(0);
                let t: f32 = args.texel_read(0, i.min(extent.width() - 1), 0, 0);
                let v: f32 = args.buffer_read(0, i);
                args.buffer_write(1, i, v + t);
            }
        })
}
