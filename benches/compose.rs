use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gemini_overlay::history::{ConversationContext, ConversationEntry};
use gemini_overlay::modes::Mode;
use gemini_overlay::prompt::compose;

fn full_history() -> ConversationContext {
    let mut ctx = ConversationContext::new(50);
    for i in 0..25 {
        ctx.append(ConversationEntry::user(format!("Question {i}: how does borrowing work?")));
        ctx.append(ConversationEntry::assistant(
            format!("Answer {i}: ").repeat(40),
            Some("Normal".into()),
        ));
    }
    ctx
}

/// Prompt assembly with a full 50 entry transcript and a few pins.
fn bench_compose(c: &mut Criterion) {
    let ctx = full_history();
    let pins: Vec<String> = (0..5).map(|i| format!("pinned fact {i}")).collect();

    c.bench_function("compose_single_turn", |b| {
        b.iter(|| compose(black_box("what is a lifetime?"), Mode::Teacher, &pins, None))
    });
    c.bench_function("compose_multi_turn_50", |b| {
        b.iter(|| compose(black_box("what is a lifetime?"), Mode::Teacher, &pins, Some(&ctx)))
    });
    c.bench_function("compose_quick_command", |b| {
        b.iter(|| compose(black_box("/summarize some text"), Mode::Normal, &pins, Some(&ctx)))
    });
}

criterion_group!(benches, bench_compose);
criterion_main!(benches);
