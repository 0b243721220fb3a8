use std::path::Path;

use criterion::{criterion_group, criterion_main, Criterion};
use mailkeep::parser::charset::CharsetResolver;
use mailkeep::parser::eml::{read_eml, split_headers};
use mailkeep::parser::header::{decode_envelope, Headers};
use mailkeep::parser::mime::extract_content;

fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    read_eml(path).unwrap()
}

fn bench_extract_content(c: &mut Criterion) {
    let resolver = CharsetResolver::default();
    let raw = fixture("broadcast_latin5.eml");

    c.bench_function("extract_content_latin5", |b| {
        b.iter(|| extract_content(&raw, &resolver))
    });
}

fn bench_decode_envelope(c: &mut Criterion) {
    let resolver = CharsetResolver::default();
    let raw = fixture("broadcast_latin5.eml");
    let (header_bytes, _) = split_headers(&raw);

    c.bench_function("decode_envelope_latin5", |b| {
        b.iter(|| decode_envelope(&Headers::parse(header_bytes, &resolver), &resolver))
    });
}

fn bench_charset_fallback(c: &mut Criterion) {
    let resolver = CharsetResolver::default();
    let raw = fixture("mislabeled_charset.eml");

    c.bench_function("extract_content_mislabeled", |b| {
        b.iter(|| extract_content(&raw, &resolver))
    });
}

criterion_group!(
    benches,
    bench_extract_content,
    bench_decode_envelope,
    bench_charset_fallback
);
criterion_main!(benches);
