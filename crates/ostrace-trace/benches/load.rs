use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ostrace_core::TraceKind;
use ostrace_trace::generator::{generate_banker, generate_deadlock, generate_memory};
use ostrace_trace::load::{load, LoadOptions};

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_strict");
    let opts = LoadOptions::default();

    for &n in &[1_000usize, 10_000usize] {
        group.throughput(Throughput::Elements(n as u64));

        let memory = generate_memory(n, 4, 2024);
        group.bench_function(BenchmarkId::new("memory", n), |b| {
            b.iter(|| load(black_box(Some(&memory)), TraceKind::Memory, &opts));
        });

        let banker = generate_banker(n, 4, false, 2024);
        group.bench_function(BenchmarkId::new("banker", n), |b| {
            b.iter(|| load(black_box(Some(&banker)), TraceKind::Banker, &opts));
        });

        let fx = generate_deadlock(n, 4, n / 10, 2024);
        let with_topo = opts.with_topology(&fx.topology);
        group.bench_function(BenchmarkId::new("deadlock+topology", n), |b| {
            b.iter(|| load(black_box(Some(&fx.trace)), TraceKind::Deadlock, &with_topo));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_load);
criterion_main!(benches);
