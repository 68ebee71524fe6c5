//! String payload codec benchmarks
//!
//! Every Java string crossing the bridge expands to one token per byte (UTF-8) or per
//! code unit (UTF-16), so string-heavy calls dominate wire cost.
//!
//! # Payload Sizes
//!
//! - **Small**: a member name (~16 bytes)
//! - **Medium**: a short document fragment (~1KB)
//! - **Large**: a serialized script result (~64KB)

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use liveconnect_transport::codec::{
    decode_utf8_payload, decode_utf16_payload, encode_utf8_string, encode_utf16_string,
};
use liveconnect_transport::{Message, WideString};

fn payload(size: usize) -> String {
    "getElementById(\"päge\");".chars().cycle().take(size).collect()
}

fn sizes() -> [(&'static str, usize); 3] {
    [("small", 16), ("medium", 1024), ("large", 64 * 1024)]
}

fn bench_utf8(c: &mut Criterion) {
    let mut group = c.benchmark_group("utf8");
    for (name, size) in sizes() {
        let text = payload(size);
        let tokens = encode_utf8_string(&text);
        group.throughput(Throughput::Bytes(text.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", name), &text, |b, text| {
            b.iter(|| encode_utf8_string(black_box(text)))
        });
        group.bench_with_input(BenchmarkId::new("decode", name), &tokens, |b, tokens| {
            b.iter(|| decode_utf8_payload(black_box(tokens)))
        });
    }
    group.finish();
}

fn bench_utf16(c: &mut Criterion) {
    let mut group = c.benchmark_group("utf16");
    for (name, size) in sizes() {
        let text = WideString::from(payload(size).as_str());
        let tokens = encode_utf16_string(&text);
        group.throughput(Throughput::Elements(text.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", name), &text, |b, text| {
            b.iter(|| encode_utf16_string(black_box(text)))
        });
        group.bench_with_input(BenchmarkId::new("decode", name), &tokens, |b, tokens| {
            b.iter(|| decode_utf16_payload(black_box(tokens)))
        });
    }
    group.finish();
}

fn bench_message(c: &mut Criterion) {
    let wire = Message::instance(1, 42, "JavaScriptCall")
        .with_source("http://example.com/applet page.html")
        .arg(7)
        .utf8_arg(&payload(256))
        .to_wire();

    c.bench_function("message/parse", |b| b.iter(|| Message::parse(black_box(&wire))));
}

criterion_group!(benches, bench_utf8, bench_utf16, bench_message);
criterion_main!(benches);
