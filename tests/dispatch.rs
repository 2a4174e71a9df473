mod common;

use kiln::*;

#[test]
fn identity_kernel_copies_buffer_to_buffer() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::with_function(&device, common::LIB_PATH, "copy").unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    let data: Vec<f32> = (0..10).map(|i| i as f32).collect();
    let mut input = Buffer::<f32>::shared(&device, 10).unwrap();
    input.write_from(&data).unwrap();
    let output = Buffer::<f32>::shared(&device, 10).unwrap();

    manager.load_buffer(&input, 0).unwrap();
    manager.load_buffer(&output, 1).unwrap();
    manager.dispatch(&kernel).unwrap();

    assert_eq!(output.get_data().unwrap(), data);
}

#[test]
fn add_kernel_sums_three_buffers() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::with_function(&device, common::LIB_PATH, "add_arrays").unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    let mut a = Buffer::<f32>::shared(&device, 16).unwrap();
    let mut b = Buffer::<f32>::shared(&device, 16).unwrap();
    let out = Buffer::<f32>::shared(&device, 16).unwrap();
    a.write_from(&vec![1.25; 16]).unwrap();
    b.write_from(&vec![2.75; 16]).unwrap();

    manager.load_buffer(&a, 0).unwrap();
    manager.load_buffer(&b, 1).unwrap();
    manager.load_buffer(&out, 2).unwrap();
    manager.dispatch(&kernel).unwrap();

    assert_eq!(out.get_data().unwrap(), vec![4.0; 16]);
}

#[test]
fn texture_add_produces_elementwise_sums() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::with_function(&device, common::LIB_PATH, "add_textures").unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    let ones = vec![vec![1.0f32; 5]; 5];
    let mut a = Texture::<f32>::d2(&device, 5, 5).unwrap();
    let mut b = Texture::<f32>::d2(&device, 5, 5).unwrap();
    let out = Texture::<f32>::d2(&device, 5, 5).unwrap();
    a.write_2d(&ones).unwrap();
    b.write_2d(&ones).unwrap();

    manager.load_texture(&a, 0).unwrap();
    manager.load_texture(&b, 1).unwrap();
    manager.load_texture(&out, 2).unwrap();
    manager.dispatch(&kernel).unwrap();

    let result = out.read_2d().unwrap();
    assert_eq!(result, vec![vec![2.0f32; 5]; 5]);
}

#[test]
fn texture3d_add_covers_the_whole_grid() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::with_function(&device, common::LIB_PATH, "add_textures").unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    let block = vec![vec![vec![3.0f32; 4]; 3]; 2];
    let mut a = Texture::<f32>::d3(&device, 4, 3, 2).unwrap();
    let mut b = Texture::<f32>::d3(&device, 4, 3, 2).unwrap();
    let out = Texture::<f32>::d3(&device, 4, 3, 2).unwrap();
    a.write_3d(&block).unwrap();
    b.write_3d(&block).unwrap();

    manager.load_texture(&a, 0).unwrap();
    manager.load_texture(&b, 1).unwrap();
    manager.load_texture(&out, 2).unwrap();
    manager.dispatch(&kernel).unwrap();

    assert_eq!(out.read_3d().unwrap(), vec![vec![vec![6.0f32; 4]; 3]; 2]);
}

#[test]
fn combined_buffer_and_texture_dispatch() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::with_function(&device, common::LIB_PATH, "offset_by_texel").unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    // Buffer family is longer than the texture family; the grid takes
    // the wider of the two along x.
    let mut input = Buffer::<f32>::shared(&device, 8).unwrap();
    input
        .write_from(&(0..8).map(|i| i as f32).collect::<Vec<_>>())
        .unwrap();
    let output = Buffer::<f32>::shared(&device, 8).unwrap();

    let mut offsets = Texture::<f32>::d1(&device, 4).unwrap();
    offsets.write_1d(&[10.0, 20.0, 30.0, 40.0]).unwrap();

    manager.load_buffer(&input, 0).unwrap();
    manager.load_buffer(&output, 1).unwrap();
    manager.load_texture(&offsets, 0).unwrap();
    manager.dispatch(&kernel).unwrap();

    // Elements past the texture width clamp to its last texel.
    assert_eq!(
        output.get_data().unwrap(),
        vec![10.0, 21.0, 32.0, 43.0, 44.0, 45.0, 46.0, 47.0]
    );
}

#[test]
fn one_buffer_bound_at_two_slots_keeps_its_contents() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::with_function(&device, common::LIB_PATH, "copy").unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    let mut buffer = Buffer::<f32>::shared(&device, 4).unwrap();
    buffer.write_from(&[1.0, 2.0, 3.0, 4.0]).unwrap();

    // Both slots resolve to the same device allocation; the kernel
    // copies the buffer onto itself.
    manager.load_buffer(&buffer, 0).unwrap();
    manager.load_buffer(&buffer, 1).unwrap();
    manager.dispatch(&kernel).unwrap();

    assert_eq!(buffer.get_data().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn one_texture_bound_at_several_slots_is_shared() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::with_function(&device, common::LIB_PATH, "add_textures").unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    let mut tex = Texture::<f32>::d2(&device, 3, 3).unwrap();
    tex.write_2d(&vec![vec![1.5f32; 3]; 3]).unwrap();

    // Input and output slots all alias one texture, so the add doubles
    // it in place.
    manager.load_texture(&tex, 0).unwrap();
    manager.load_texture(&tex, 1).unwrap();
    manager.load_texture(&tex, 2).unwrap();
    manager.dispatch(&kernel).unwrap();

    assert_eq!(tex.read_2d().unwrap(), vec![vec![3.0f32; 3]; 3]);
}

#[test]
fn switching_functions_refreshes_the_cached_pipeline() {
    let (_soft, device) = common::test_device();
    let mut kernel = Kernel::with_function(&device, common::LIB_PATH, "copy").unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    let mut input = Buffer::<f32>::shared(&device, 4).unwrap();
    input.write_from(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    let output = Buffer::<f32>::shared(&device, 4).unwrap();

    manager.load_buffer(&input, 0).unwrap();
    manager.load_buffer(&output, 1).unwrap();
    manager.dispatch(&kernel).unwrap();
    assert_eq!(output.get_data().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);

    kernel.use_function("scale").unwrap();
    manager.dispatch(&kernel).unwrap();
    assert_eq!(output.get_data().unwrap(), vec![2.0, 4.0, 6.0, 8.0]);
}

#[test]
fn repeat_dispatches_reuse_the_bound_slots() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::with_function(&device, common::LIB_PATH, "scale").unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    let mut buffer = Buffer::<f32>::shared(&device, 4).unwrap();
    buffer.write_from(&[1.0; 4]).unwrap();
    let output = Buffer::<f32>::shared(&device, 4).unwrap();

    manager.load_buffer(&buffer, 0).unwrap();
    manager.load_buffer(&output, 1).unwrap();

    manager.dispatch(&kernel).unwrap();
    assert_eq!(output.get_data().unwrap(), vec![2.0; 4]);

    // Feed the result back in through the alias already bound at slot 0.
    buffer.write_from(&output.get_data().unwrap()).unwrap();
    manager.dispatch(&kernel).unwrap();
    assert_eq!(output.get_data().unwrap(), vec![4.0; 4]);
}

#[test]
fn dispatch_without_a_compiled_pipeline_is_rejected() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::load(&device, common::LIB_PATH).unwrap();
    let mut manager = CommandManager::new(&device, &kernel).unwrap();

    let buffer = Buffer::<f32>::shared(&device, 4).unwrap();
    manager.load_buffer(&buffer, 0).unwrap();

    let err = manager.dispatch(&kernel).unwrap_err();
    assert!(matches!(err, ComputeError::Load { what: "pipeline", .. }));
}

#[test]
fn unknown_entry_point_leaves_no_usable_pipeline() {
    let (_soft, device) = common::test_device();
    let mut kernel = Kernel::with_function(&device, common::LIB_PATH, "copy").unwrap();

    let err = kernel.use_function("does_not_exist").unwrap_err();
    assert!(matches!(err, ComputeError::Load { what: "function", .. }));
    assert!(kernel.pipeline().is_none());
    assert!(kernel.entry_point().is_none());
}

#[test]
fn missing_library_fails_fast() {
    let (_soft, device) = common::test_device();
    let err = Kernel::load(&device, "nope.klib").unwrap_err();
    assert!(matches!(err, ComputeError::Load { what: "library", .. }));
}

#[test]
fn function_names_preserve_library_order() {
    let (_soft, device) = common::test_device();
    let kernel = Kernel::load(&device, common::LIB_PATH).unwrap();

    assert_eq!(
        kernel.function_names().unwrap(),
        vec![
            "copy",
            "add_arrays",
            "scale",
            "add_textures",
            "offset_by_texel",
        ]
    );
}
