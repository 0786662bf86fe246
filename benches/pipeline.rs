use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use eml2pdf::model::message::Message;
use eml2pdf::render::{document, sanitize};

fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_parse_and_walk(c: &mut Criterion) {
    let raw = fixture_bytes("html_with_cid.eml");

    c.bench_function("parse_and_walk_html_with_cid", |b| {
        b.iter(|| Message::parse(&raw).unwrap())
    });
}

fn bench_sanitize(c: &mut Criterion) {
    let message = Message::parse(&fixture_bytes("html_with_cid.eml")).unwrap();
    let assembled = document::assemble(&message).unwrap();

    c.bench_function("sanitize_assembled_document", |b| {
        b.iter(|| sanitize::sanitize(&assembled))
    });
}

criterion_group!(benches, bench_parse_and_walk, bench_sanitize);
criterion_main!(benches);
