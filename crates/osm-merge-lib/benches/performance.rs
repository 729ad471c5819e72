//! Performance benchmarks for osm-merge-lib
//!
//! Run with: cargo bench --package osm-merge-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use osm_merge_lib::{
    Document, IdAllocator, Member, MergedDocument, Node, RecordKind, Relation, Way, WriterConfig,
    parse_document, renumber, to_xml,
};

/// Generate a document with a grid-like street network of `num_ways` ways
fn generate_document(num_ways: usize, nodes_per_way: usize, base_lat: f64) -> Document {
    let mut doc = Document::new();
    let mut next_node = 1;

    for w in 0..num_ways {
        let mut refs = Vec::with_capacity(nodes_per_way);
        for i in 0..nodes_per_way {
            let lat = base_lat + w as f64 * 0.001;
            let lon = -0.1 + i as f64 * 0.0005;
            let mut node = Node::new(next_node, lat, lon);
            if i % 10 == 0 {
                node.tags.insert("highway".to_string(), "crossing".to_string());
            }
            doc.insert_node(node);
            refs.push(next_node);
            next_node += 1;
        }
        let mut way = Way::new(w as i64 + 1, refs);
        way.tags.insert("highway".to_string(), "residential".to_string());
        doc.insert_way(way);
    }

    let members = (1..=num_ways as i64)
        .map(|id| Member::new(RecordKind::Way, id, "street"))
        .collect();
    doc.insert_relation(Relation::new(1, members));
    doc
}

fn merged_from(documents: Vec<Document>) -> MergedDocument {
    let mut allocator = IdAllocator::new();
    let mut merged = MergedDocument::new();
    for mut doc in documents {
        renumber(&mut doc, &mut allocator).unwrap();
        merged.append(doc).unwrap();
    }
    merged
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_renumber(c: &mut Criterion) {
    let mut group = c.benchmark_group("renumber");

    for &num_ways in &[10, 100, 1000] {
        let doc = generate_document(num_ways, 50, 51.5);
        group.throughput(Throughput::Elements((num_ways * 50) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_ways), &doc, |b, doc| {
            b.iter_batched(
                || doc.clone(),
                |mut doc| {
                    let mut allocator = IdAllocator::new();
                    renumber(&mut doc, &mut allocator).unwrap();
                    doc
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_merge_documents(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.sample_size(20);

    let documents: Vec<Document> = (0..8)
        .map(|i| generate_document(200, 50, 51.0 + i as f64))
        .collect();

    group.bench_function("8_documents", |b| {
        b.iter_batched(
            || documents.clone(),
            merged_from,
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_roundtrip_xml(c: &mut Criterion) {
    let mut group = c.benchmark_group("xml");
    group.sample_size(20);

    let merged = merged_from(vec![generate_document(500, 50, 51.5)]);
    let config = WriterConfig::default();
    let xml = to_xml(&merged, &config).unwrap();
    group.throughput(Throughput::Bytes(xml.len() as u64));

    group.bench_function("write", |b| {
        b.iter(|| to_xml(&merged, &config).unwrap());
    });
    group.bench_function("parse", |b| {
        b.iter(|| parse_document(&xml).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_renumber,
    bench_merge_documents,
    bench_roundtrip_xml
);
criterion_main!(benches);
