use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mimewalk::{parse_message, DecodeOptions};

fn bench_parse_fixture(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("newsletter.eml");
    let raw = std::fs::read(&fixture_path).unwrap();
    let options = DecodeOptions::default();

    c.bench_function("parse_newsletter", |b| {
        b.iter(|| parse_message(&raw, &options).unwrap())
    });
}

fn bench_parse_large_attachment(c: &mut Criterion) {
    let mut raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n\
                    --x\r\nContent-Type: text/plain\r\n\r\nbody\r\n\
                    --x\r\nContent-Type: application/octet-stream\r\n\
                    Content-Transfer-Encoding: base64\r\n\r\n"
        .to_vec();
    for _ in 0..50_000 {
        raw.extend_from_slice(b"QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVphYmNkZWZnaGlqa2xtbm9wcXJzdHV2\r\n");
    }
    raw.extend_from_slice(b"--x--\r\n");
    let options = DecodeOptions::metadata_only();

    c.bench_function("parse_base64_attachment_3mb", |b| {
        b.iter(|| parse_message(&raw, &options).unwrap())
    });
}

fn bench_fallback_split(c: &mut Criterion) {
    let mut raw = String::from("Content-Type: multipart/mixed; boundary=b\n\n");
    for i in 0..100 {
        raw.push_str(&format!(" --b\nContent-Type: text/plain\n\npart {i}\n"));
    }
    raw.push_str(" --b--\n");
    let options = DecodeOptions::default();

    c.bench_function("parse_fallback_100_parts", |b| {
        b.iter(|| parse_message(raw.as_bytes(), &options).unwrap())
    });
}

criterion_group!(
    benches,
    bench_parse_fixture,
    bench_parse_large_attachment,
    bench_fallback_split
);
criterion_main!(benches);
