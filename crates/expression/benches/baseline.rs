// Baseline benchmarks for structr-expression
// Run with: cargo bench --bench baseline

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use structr_expression::lexer::Lexer;
use structr_expression::services::{MemorySecurity, MemoryStore};
use structr_expression::{ActionContext, EntityRef, ExpressionEngine, Services, Template};

const FIXTURE: &str = r#"{
    "types": { "User": { "properties": { "email": { "indexed": true } } } },
    "entities": [
        { "id": "u1", "type": "User", "properties": { "name": "Alice", "email": "alice@example.com" } },
        { "id": "u2", "type": "User", "properties": { "name": "Bob", "email": "bob@example.com" } }
    ]
}"#;

const NESTED: &str = "if(gt(size(merge(1, 2, 3)), 2), concat(upper('a'), lower('B'), join(merge('x', 'y'), '-')), 'none')";

// ================================
// Tokenizer / parser
// ================================

fn benchmark_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    group.bench_function("simple", |b| {
        b.iter(|| Lexer::new(black_box("upper(this.name)")).tokenize())
    });
    group.bench_function("nested", |b| b.iter(|| Lexer::new(black_box(NESTED)).tokenize()));

    group.finish();
}

fn benchmark_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let engine = ExpressionEngine::new();

    group.bench_function("simple", |b| b.iter(|| engine.parse(black_box("upper(this.name)"))));
    group.bench_function("nested", |b| b.iter(|| engine.parse(black_box(NESTED))));
    group.bench_function("template", |b| {
        b.iter(|| Template::parse(black_box("<h1>${this.name}</h1><p>${{ upper(this.email) }}</p>")))
    });

    group.finish();
}

// ================================
// Evaluation
// ================================

fn benchmark_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    let store = Arc::new(MemoryStore::from_json(FIXTURE).expect("fixture"));
    let services = Services::builder()
        .store(store)
        .security(MemorySecurity::arc())
        .build();
    let engine = ExpressionEngine::builder().services(services).build();
    let alice = EntityRef::node("u1", "User");

    group.bench_function("arithmetic", |b| {
        b.iter(|| {
            let mut ctx = ActionContext::new();
            engine.evaluate(black_box("add(1, mult(2, 3), quot(10, 4))"), &mut ctx, None)
        })
    });
    group.bench_function("nested", |b| {
        b.iter(|| engine.evaluate(black_box(NESTED), &mut ActionContext::new(), None))
    });
    group.bench_function("property", |b| {
        b.iter(|| engine.evaluate(black_box("upper(this.name)"), &mut ActionContext::new(), Some(&alice)))
    });
    group.bench_function("find", |b| {
        b.iter(|| {
            engine.evaluate(
                black_box("get(find('User', 'email', 'bob@example.com')[0], 'name')"),
                &mut ActionContext::new(),
                None,
            )
        })
    });
    group.bench_function("render", |b| {
        b.iter(|| {
            engine.render(
                black_box("Dear ${this.name}, you have ${size(find('User'))} colleagues."),
                &mut ActionContext::new(),
                Some(&alice),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_tokenize, benchmark_parse, benchmark_evaluate);
criterion_main!(benches);
