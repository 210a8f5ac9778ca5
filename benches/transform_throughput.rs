//! Transformation throughput benchmarks
//!
//! Measures a sort-and-group stylesheet over documents of varying size, both on
//! the calling thread and through the worker pipeline.
//!
//! Run benchmarks: `cargo bench --bench transform_throughput`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use trellis::pipeline::transform_on_worker;
use trellis::{
    EventRecorder, Expr, Grouping, Instruction, SimplePathEvaluator, SortKey, Stylesheet, Template,
    TransformConfig, transform_to_string,
};

fn report_stylesheet() -> Stylesheet {
    Stylesheet::builder()
        .template(Template::matching(
            "orders",
            vec![Instruction::ForEachGroup {
                select: Expr::new("order"),
                grouping: Grouping::By(Expr::new("@region")),
                sort_keys: vec![SortKey::text("current-grouping-key()")],
                body: vec![Instruction::element(
                    "region",
                    vec![Instruction::ForEach {
                        select: Expr::new("current-group()"),
                        sort_keys: vec![SortKey::number("@total").descending()],
                        body: vec![Instruction::element("total", vec![Instruction::value_of("@total")])],
                    }],
                )],
            }],
        ))
        .build()
}

fn generate_orders(count: usize) -> String {
    let mut xml = String::from("<orders>");
    for i in 0..count {
        xml.push_str(&format!(
            r#"<order region="r{}" total="{}"/>"#,
            i % 7,
            (i * 37) % 1000
        ));
    }
    xml.push_str("</orders>");
    xml
}

fn bench_serialized(c: &mut Criterion) {
    let stylesheet = report_stylesheet();
    let config = TransformConfig::default();
    let mut group = c.benchmark_group("serialized");
    for count in [10, 100, 1000] {
        let xml = generate_orders(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &xml, |b, xml| {
            b.iter(|| transform_to_string(black_box(xml), &stylesheet, &config))
        });
    }
    group.finish();
}

fn bench_worker(c: &mut Criterion) {
    let stylesheet = report_stylesheet();
    let evaluator = SimplePathEvaluator::new();
    let config = TransformConfig::default();
    let mut group = c.benchmark_group("worker");
    for count in [100, 1000] {
        let xml = generate_orders(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &xml, |b, xml| {
            b.iter(|| {
                let mut recorder = EventRecorder::new();
                transform_on_worker(black_box(xml), &stylesheet, &evaluator, &config, &mut recorder)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_serialized, bench_worker);
criterion_main!(benches);
