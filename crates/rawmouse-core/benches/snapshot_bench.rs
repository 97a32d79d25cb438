//! Criterion benchmarks for the poll snapshot codec.
//!
//! Measures encoding and decoding of snapshots at sizes seen in practice: an
//! idle poll, a single moving mouse, and a burst of button edges across
//! several devices.
//!
//! Run with:
//! ```bash
//! cargo bench --package rawmouse-core --bench snapshot_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rawmouse_core::domain::buttons::ButtonEdge;
use rawmouse_core::{
    decode_snapshot, encode_snapshot, DeviceId, DiscreteEvent, MovementSample, Snapshot,
};

// ── Snapshot fixtures ─────────────────────────────────────────────────────────

fn make_idle() -> Snapshot {
    Snapshot::default()
}

fn make_single_mover() -> Snapshot {
    Snapshot {
        events: Vec::new(),
        movements: vec![MovementSample {
            device: DeviceId(65_601),
            x: 14,
            y: -9,
            wheel: 0,
        }],
    }
}

fn make_busy(devices: i32) -> Snapshot {
    let mut events = Vec::new();
    let mut movements = Vec::new();
    for d in 0..devices {
        let device = DeviceId(d);
        events.push(DiscreteEvent::button(device, ButtonEdge::Pressed(1)));
        events.push(DiscreteEvent::button(device, ButtonEdge::Released(1)));
        movements.push(MovementSample {
            device,
            x: d,
            y: -d,
            wheel: 120,
        });
    }
    Snapshot { events, movements }
}

fn fixtures() -> Vec<(&'static str, Snapshot)> {
    vec![
        ("idle", make_idle()),
        ("single_mover", make_single_mover()),
        ("busy_4", make_busy(4)),
        ("busy_64", make_busy(64)),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_snapshot");
    for (name, snapshot) in fixtures() {
        group.bench_with_input(BenchmarkId::new("snapshot", name), &snapshot, |b, s| {
            b.iter(|| encode_snapshot(black_box(s)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_snapshot");
    for (name, snapshot) in fixtures() {
        let bytes = encode_snapshot(&snapshot);
        group.bench_with_input(BenchmarkId::new("snapshot", name), &bytes, |b, bytes| {
            b.iter(|| decode_snapshot(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
