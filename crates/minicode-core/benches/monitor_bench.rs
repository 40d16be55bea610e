// ─────────────────────────────────────────────────────────────────────
// Minicode — Safety Monitor Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for the per-fragment hot path. `observe` runs
//! once per emitted fragment on the generation worker.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use minicode_core::{build_prompt, SafetyMonitor, ScriptedEngine, SessionController, SYSTEM_PREAMBLE};
use minicode_types::{GenerationRequest, PromptBudget};

fn code_fragments(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            if i % 8 == 7 {
                format!(" v{i};\n")
            } else {
                format!(" t{i}")
            }
        })
        .collect()
}

fn run_monitor(fragments: &[String]) {
    let mut monitor = SafetyMonitor::new(&PromptBudget::default());
    let mut out = String::new();
    for f in fragments {
        out.push_str(f);
        black_box(monitor.observe(&out, f, 0));
    }
}

// ── SafetyMonitor.observe() ─────────────────────────────────────────

fn bench_monitor_100_fragments(c: &mut Criterion) {
    let fragments = code_fragments(100);
    c.bench_function("monitor_100frag", |b| b.iter(|| run_monitor(black_box(&fragments))));
}

fn bench_monitor_900_fragments(c: &mut Criterion) {
    let fragments = code_fragments(900);
    c.bench_function("monitor_900frag", |b| b.iter(|| run_monitor(black_box(&fragments))));
}

// ── build_prompt() ──────────────────────────────────────────────────

fn bench_build_prompt_truncating(c: &mut Criterion) {
    let context = "let value = compute(input);\n".repeat(500);
    c.bench_function("build_prompt_truncating", |b| {
        b.iter(|| {
            build_prompt(
                black_box(SYSTEM_PREAMBLE),
                black_box("fix the off-by-one error"),
                &[],
                black_box(&context),
                2000,
            )
        })
    });
}

// ── Full session: controller + worker + monitor ─────────────────────

fn bench_full_session(c: &mut Criterion) {
    let engine = Arc::new(ScriptedEngine::new(code_fragments(200)));
    let ctl = SessionController::new(engine, PromptBudget::default())
        .expect("default budget is valid");
    c.bench_function("full_session_200frag", |b| {
        b.iter(|| ctl.generate(GenerationRequest::new("refactor"), |t| {
            black_box(t);
        }))
    });
}

criterion_group!(
    benches,
    bench_monitor_100_fragments,
    bench_monitor_900_fragments,
    bench_build_prompt_truncating,
    bench_full_session,
);
criterion_main!(benches);
