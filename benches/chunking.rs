use criterion::{Criterion, criterion_group, criterion_main};
use portfolio_rag::embeddings::chunking::{ChunkingConfig, chunk_markdown};
use std::fmt::Write;
use std::hint::black_box;

fn portfolio_document() -> String {
    let mut doc = String::from("Overview of selected projects.\n\n");
    for project in 0..40 {
        writeln!(doc, "# Project {project}\n").expect("writing to a String cannot fail");
        doc.push_str("## Situation\n\nThe nightly batch job missed its window twice a week.\n\n");
        doc.push_str("## Action\n\n");
        doc.push_str(&"Profiled the pipeline, moved hot joins into Postgres and cached lookups. ".repeat(30));
        doc.push_str("\n\n```sql\nSELECT id, total FROM orders WHERE created_at > now() - interval '1 day';\n```\n\n");
        doc.push_str("## Result\n\nReduced runtime by 65% and removed 3 on-call pages per week.\n\n");
    }
    doc
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let doc = portfolio_document();
    let config = ChunkingConfig::default();
    let small = ChunkingConfig {
        max_chunk_size: 100,
        ..ChunkingConfig::default()
    };

    c.bench_function("chunking", |b| {
        b.iter(|| chunk_markdown(black_box(&doc), black_box("projects"), black_box(&config)))
    });
    c.bench_function("chunking_oversized_sections", |b| {
        b.iter(|| chunk_markdown(black_box(&doc), black_box("projects"), black_box(&small)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
