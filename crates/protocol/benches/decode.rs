//! Benchmarks for input report decoding
//!
//! A wired controller delivers reports every few milliseconds; decoding sits
//! on the interrupt path and must stay cheap.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use protocol::{ControllerInput, REPORT_SIZE, StatusCode, decode, encode};

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("input_report");
    group.throughput(Throughput::Bytes(REPORT_SIZE as u64));

    let input = ControllerInput {
        status: StatusCode::Input,
        seq: 4242,
        buttons: 0x0010_0400,
        ltrig: 90,
        lpad_x: -12000,
        lpad_y: 8000,
        gpitch: 17,
        ..ControllerInput::NULL
    };
    let raw = encode(&input);

    group.bench_function("decode", |b| b.iter(|| decode(black_box(&raw))));
    group.bench_function("encode", |b| b.iter(|| encode(black_box(&input))));

    let short = &raw[..32];
    group.bench_function("decode_malformed", |b| {
        b.iter(|| decode(black_box(short)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_decode);
criterion_main!(benches);
