mod common;

use kiln::*;

#[test]
fn facade_runs_an_array_kernel_end_to_end() {
    let (_soft, device) = common::test_device();
    let mut gpu = Gpu::<f32>::new(&device);
    gpu.load_kernel(common::LIB_PATH, "add_arrays").unwrap();

    gpu.load_array(&[1.0; 12], 0).unwrap();
    gpu.load_array(&[2.0; 12], 1).unwrap();
    gpu.load_array(&[0.0; 12], 2).unwrap();
    gpu.run_kernel().unwrap();

    assert_eq!(gpu.get_array(2).unwrap(), vec![3.0; 12]);
}

#[test]
fn facade_runs_a_matrix_kernel_end_to_end() {
    let (_soft, device) = common::test_device();
    let mut gpu = Gpu::<f32>::new(&device);
    gpu.load_kernel(common::LIB_PATH, "add_textures").unwrap();

    let ones = vec![vec![1.0f32; 5]; 5];
    gpu.load_matrix(&ones, 0).unwrap();
    gpu.load_matrix(&ones, 1).unwrap();
    gpu.load_matrix(&vec![vec![0.0f32; 5]; 5], 2).unwrap();
    gpu.run_kernel().unwrap();

    assert_eq!(gpu.get_matrix(2).unwrap(), vec![vec![2.0f32; 5]; 5]);
}

#[test]
fn facade_operations_require_a_loaded_kernel() {
    let (_soft, device) = common::test_device();
    let mut gpu = Gpu::<f32>::new(&device);

    assert!(matches!(
        gpu.load_array(&[0.0; 4], 0),
        Err(ComputeError::Load { .. })
    ));
    assert!(matches!(gpu.run_kernel(), Err(ComputeError::Load { .. })));
    assert!(matches!(gpu.get_array(0), Err(ComputeError::Load { .. })));
}

#[test]
fn facade_reset_allows_new_shapes() {
    let (_soft, device) = common::test_device();
    let mut gpu = Gpu::<f32>::new(&device);
    gpu.load_kernel(common::LIB_PATH, "copy").unwrap();

    gpu.load_array(&[1.0; 8], 0).unwrap();
    let err = gpu.load_array(&[1.0; 9], 1).unwrap_err();
    assert!(matches!(err, ComputeError::SizeMismatch { .. }));

    gpu.reset().unwrap();
    gpu.load_array(&[1.0; 9], 0).unwrap();
    gpu.load_array(&[0.0; 9], 1).unwrap();
    gpu.run_kernel().unwrap();
    assert_eq!(gpu.get_array(1).unwrap(), vec![1.0; 9]);
}

#[test]
fn facade_entry_point_can_be_inspected() {
    let (_soft, device) = common::test_device();
    let mut gpu = Gpu::<f32>::new(&device);
    gpu.load_kernel(common::LIB_PATH, "scale").unwrap();

    let kernel = gpu.kernel().unwrap();
    assert_eq!(kernel.entry_point(), Some("scale"));
}
