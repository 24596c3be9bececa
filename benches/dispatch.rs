//! Dispatch throughput benchmark suite.
//!
//! Measures the session over an in-memory document:
//! - Batches of DOM commands
//! - Canvas op-lists of growing length
//! - Binary blits of growing size
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use gempyre_client::protocol::CanvasFrame;
use gempyre_client::{Document, Incoming, MemoryDocument, Outbox, Session};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BATCH_SIZES: &[usize] = &[10, 100, 1000];
const OP_COUNTS: &[usize] = &[100, 1000, 10_000];
const BLIT_SIDES: &[u32] = &[16, 64, 256];

// ============================================================================
// Fixtures
// ============================================================================

/// Logs stay off unless `RUST_LOG` asks for them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn batch(size: usize) -> Value {
    let items: Vec<Value> = (0..size)
        .flat_map(|i| {
            let id = format!("e{i}");
            [
                json!({"type": "create", "element": "", "html_element": "div", "new_id": id}),
                json!({"type": "set_attribute", "element": id, "attribute": "title", "value": "x"}),
                json!({"type": "set_style", "element": id, "style": "color", "value": "red"}),
                json!({"type": "remove", "element": "", "remove": id}),
            ]
        })
        .collect();
    json!({"type": "batch", "batches": items})
}

fn op_list(count: usize) -> Value {
    let commands: Vec<Value> = (0..count)
        .flat_map(|i| {
            let v = (i % 100) as f64;
            [json!("fillRect"), json!(v), json!(v), json!(10), json!(10)]
        })
        .collect();
    json!({"type": "canvas_draw", "element": "c", "commands": commands})
}

fn canvas_document() -> MemoryDocument {
    let mut doc = MemoryDocument::new();
    let canvas = doc.insert(doc.root(), "canvas", "c");
    doc.set_attribute(canvas, "width", "256");
    doc.set_attribute(canvas, "height", "256");
    doc
}

// ============================================================================
// Benchmark: Command Batches
// ============================================================================

fn bench_batches(c: &mut Criterion) {
    init_tracing();
    let mut group = c.benchmark_group("batch");

    for &size in BATCH_SIZES {
        let text = batch(size).to_string();
        group.throughput(Throughput::Elements(size as u64 * 4));
        group.bench_with_input(BenchmarkId::new("dom_commands", size), &text, |b, text| {
            let (outbox, mut rx) = Outbox::channel();
            let mut session = Session::new(outbox);
            let mut doc = MemoryDocument::new();
            b.iter(|| {
                session.dispatch(&mut doc, Incoming::Text(text.clone()));
                rx.drain();
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Canvas Op-Lists
// ============================================================================

fn bench_canvas_draw(c: &mut Criterion) {
    init_tracing();
    let mut group = c.benchmark_group("canvas_draw");

    for &count in OP_COUNTS {
        let message = op_list(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("fill_rect", count), &message, |b, message| {
            let (outbox, mut rx) = Outbox::channel();
            let mut session = Session::new(outbox);
            let mut doc = canvas_document();
            b.iter(|| {
                session.dispatch(&mut doc, Incoming::Json(message.clone()));
                session.dispatch(&mut doc, Incoming::Json(json!({
                    "type": "canvas_draw", "element": "c", "commands": ["reset"]
                })));
                rx.drain();
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Binary Blits
// ============================================================================

fn bench_blit(c: &mut Criterion) {
    init_tracing();
    let mut group = c.benchmark_group("blit");

    for &side in BLIT_SIDES {
        let payload = vec![0x7f_u8; (side * side * 4) as usize];
        let frame = CanvasFrame {
            x: 0,
            y: 0,
            width: side,
            height: side,
            as_draw: true,
            target: "c".to_string(),
            payload: &payload,
        }
        .encode();

        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::new("put_image_data", side), &frame, |b, frame| {
            let (outbox, mut rx) = Outbox::channel();
            let mut session = Session::new(outbox);
            let mut doc = canvas_document();
            b.iter(|| {
                session.dispatch(&mut doc, Incoming::Binary(frame.clone()));
                rx.drain();
            });
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_batches, bench_canvas_draw, bench_blit);
criterion_main!(benches);
