//! Benchmarks for dynffi call overhead

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynffi::ffi::{ArgumentBinding, ForeignBridge, InvocationRegistry, SearchPaths, TypeCode};
use dynffi::host::Value;

fn bridge() -> ForeignBridge {
    let registry = Box::leak(Box::new(InvocationRegistry::new(SearchPaths::default())));
    ForeignBridge::new(registry)
}

/// Direct Rust call as the baseline
fn bench_baseline(c: &mut Criterion) {
    c.bench_function("native_labs", |b| b.iter(|| black_box(-42i64).abs()));
}

/// Invocation::call without the host trampoline
fn bench_invocation(c: &mut Criterion) {
    let bridge = bridge();
    bridge
        .try_load_function("", "labs", None, 'j', "j")
        .expect("labs is exported by libc");
    let invocation = bridge.registry().get("", "labs").expect("just loaded");

    let mut group = c.benchmark_group("invocation_call");
    let exact = [Value::long(-42)];
    group.bench_function("zero_copy", |b| {
        b.iter(|| black_box(invocation.call(black_box(&exact))))
    });
    let coerced = [Value::int(-42)];
    group.bench_function("coerced", |b| {
        b.iter(|| black_box(invocation.call(black_box(&coerced))))
    });
    group.finish();
}

/// Full host path: projection -> trampoline -> invocation
fn bench_dispatch(c: &mut Criterion) {
    let bridge = bridge();
    let labs = bridge.load_function("", "labs", None, 'j', "j");
    let args = [Value::long(-42)];

    c.bench_function("dispatch_labs", |b| {
        b.iter(|| black_box(labs.apply(black_box(&args))))
    });
}

fn bench_marshaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("marshaling");
    let binding = ArgumentBinding::new(TypeCode::Float);
    let value = Value::int(7);
    group.bench_function("extract_coerce", |b| {
        b.iter(|| black_box(binding.extract(black_box(&value)).is_ok()))
    });
    let raw = 2.5f64.to_ne_bytes();
    group.bench_function("read_result", |b| {
        b.iter(|| black_box(binding.read(black_box(&raw))))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_baseline,
    bench_invocation,
    bench_dispatch,
    bench_marshaling
);
criterion_main!(benches);
