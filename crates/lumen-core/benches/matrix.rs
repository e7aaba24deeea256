//! Benchmarks for the matrix stack operations run on every draw call.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lumen_core::math::{Matrix3, Matrix4, Vector3};

fn bench_transform_chain(c: &mut Criterion) {
    c.bench_function("translate_rotate_scale", |b| {
        b.iter(|| {
            let mut m = Matrix4::identity();
            m.translate(black_box(Vector3::new(10.0, 20.0, 30.0)));
            m.rotate(black_box(0.5), Vector3::new(0.0, 1.0, 1.0));
            m.scale(black_box(Vector3::new(50.0, 50.0, 50.0)));
            m
        });
    });
}

fn bench_invert(c: &mut Criterion) {
    let mut m = Matrix4::perspective(1.0, 1.5, 0.1, 1000.0);
    m.translate(Vector3::new(1.0, 2.0, 3.0));

    c.bench_function("invert", |b| b.iter(|| black_box(m).invert()));
    c.bench_function("normal_matrix", |b| {
        b.iter(|| Matrix3::inverse_transpose(black_box(&m)))
    });
}

criterion_group!(benches, bench_transform_chain, bench_invert);
criterion_main!(benches);
