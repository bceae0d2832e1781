use campaign_rag::chunker::{format_chunk, split_markdown};
use criterion::{Criterion, criterion_group, criterion_main};
use std::fmt::Write;
use std::hint::black_box;

fn campaign_document() -> String {
    let mut text = String::new();
    for chapter in 1..=20 {
        let _ = writeln!(text, "# Chapter {chapter}");
        for location in 1..=5 {
            let _ = writeln!(text, "## Location {location}");
            let _ = writeln!(text, "The road winds past old stones and quiet farms.\n");
            for room in 1..=3 {
                let _ = writeln!(text, "### Room {room}");
                let _ = writeln!(text, "A draft carries the smell of tallow and wet rope.");
                let _ = writeln!(text, "```\n# stat block, not a header\nAC 15, HP 22\n```");
            }
        }
    }
    text
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let document = campaign_document();

    c.bench_function("split_markdown", |b| {
        b.iter(|| split_markdown(black_box(&document)))
    });

    let segments = split_markdown(&document);
    c.bench_function("format_chunks", |b| {
        b.iter(|| {
            segments
                .iter()
                .map(|s| format_chunk(black_box(&s.headers), "campaign", &s.body))
                .count()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
