//! Criterion benchmarks for the clipsync JSON codec.
//!
//! The hub encodes every relayed frame once per broadcast and decodes every
//! inbound frame, so both directions sit on the hot path.
//!
//! Run with:
//! ```bash
//! cargo bench --package clipsync-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use clipsync_core::protocol::codec::{decode_envelope, encode_envelope};
use clipsync_core::protocol::messages::{DeviceId, DeviceInfo, Envelope, Event};

// ── Frame fixtures ────────────────────────────────────────────────────────────

fn make_update(len: usize) -> Envelope {
    Envelope::from_sender(
        Event::ClipboardUpdate {
            content: "x".repeat(len),
        },
        DeviceId::generate(),
    )
}

fn make_history() -> Envelope {
    Envelope::new(Event::ClipboardHistory {
        history: (0..20).map(|i| format!("clipboard entry number {i}")).collect(),
    })
}

fn make_device_list() -> Envelope {
    Envelope::new(Event::DeviceList {
        devices: (0..8)
            .map(|i| DeviceInfo {
                id: DeviceId::generate(),
                hostname: format!("host-{i}"),
            })
            .collect(),
    })
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for len in [16usize, 1024, 64 * 1024] {
        let env = make_update(len);
        group.bench_with_input(BenchmarkId::new("clipboard_update", len), &env, |b, env| {
            b.iter(|| encode_envelope(black_box(env)).unwrap())
        });
    }
    let history = make_history();
    group.bench_function("clipboard_history", |b| {
        b.iter(|| encode_envelope(black_box(&history)).unwrap())
    });
    let devices = make_device_list();
    group.bench_function("device_list", |b| {
        b.iter(|| encode_envelope(black_box(&devices)).unwrap())
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for len in [16usize, 1024, 64 * 1024] {
        let text = encode_envelope(&make_update(len)).unwrap();
        group.bench_with_input(BenchmarkId::new("clipboard_update", len), &text, |b, text| {
            b.iter(|| decode_envelope(black_box(text)).unwrap())
        });
    }
    let offer = encode_envelope(&Envelope::new(Event::FileOffer {
        filename: "report.pdf".into(),
        filesize: 1_048_576,
        target_id: Some(DeviceId::generate()),
    }))
    .unwrap();
    group.bench_function("file_offer", |b| {
        b.iter(|| decode_envelope(black_box(&offer)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
