use std::ptr;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use libc::c_int;
use mlx_sys::*;

fn bench_handle_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("boundary_handles");

    group.bench_function("from_scalar_destroy", |bench| {
        bench.iter(|| unsafe {
            let mut arr: mlx_array = ptr::null_mut();
            let rc = fromScalar(&mut arr, 1.0, mlx_dtype::FLOAT32);
            debug_assert!(rc.is_success());
            destroyArray(arr);
        });
    });

    group.bench_function("failed_call", |bench| {
        bench.iter(|| unsafe {
            let mut arr: mlx_array = ptr::null_mut();
            fromScalar(&mut arr, 1.0, mlx_dtype::COMPLEX64)
        });
    });
    group.finish();
}

fn bench_add_eval_item(c: &mut Criterion) {
    let mut group = c.benchmark_group("boundary_add_eval");

    for &n in &[1usize, 1024, 65_536] {
        group.throughput(Throughput::Elements(n as u64));
        let values: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let dims = [n as c_int];

        group.bench_function(BenchmarkId::new("f32", n), |bench| {
            bench.iter(|| unsafe {
                let mut a: mlx_array = ptr::null_mut();
                let mut s: mlx_array = ptr::null_mut();
                fromPtr(&mut a, values.as_ptr().cast(), dims.as_ptr(), 1, mlx_dtype::FLOAT32);
                add(&mut s, a, a);
                eval_array(false, s);
                destroyArray(a);
                destroyArray(s);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_handle_roundtrip, bench_add_eval_item);
criterion_main!(benches);
