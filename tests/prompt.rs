use gemini_overlay::history::{ConversationContext, ConversationEntry};
use gemini_overlay::modes::Mode;
use gemini_overlay::prompt::{compose, ComposedPrompt};
use gemini_overlay::quick_commands::{find_command, QUICK_COMMANDS};

#[test]
fn summarize_wraps_remainder() {
    let out = compose("/summarize hello world", Mode::Normal, &[], None);
    assert_eq!(
        out,
        ComposedPrompt::Forward(
            "Please provide a concise summary of the following:\n\nhello world".into()
        )
    );
}

#[test]
fn bare_command_yields_usage_hint() {
    let out = compose("/summarize", Mode::Normal, &[], None);
    assert_eq!(
        out,
        ComposedPrompt::UsageHint(
            "Please provide content after the /summarize command. For example: /summarize your text here"
                .into()
        )
    );
    assert!(matches!(
        compose("/fix    ", Mode::Coder, &[], None),
        ComposedPrompt::UsageHint(_)
    ));
}

#[test]
fn unknown_command_passes_through_verbatim() {
    let out = compose("/foo bar", Mode::Normal, &["pinned".into()], None);
    assert_eq!(out, ComposedPrompt::Forward("/foo bar".into()));
    // prefix of a real command is not a command
    assert_eq!(
        compose("/summarizex text", Mode::Normal, &[], None),
        ComposedPrompt::Forward("/summarizex text".into())
    );
}

#[test]
fn command_tokens_are_case_insensitive() {
    let out = compose("/PROS remote work", Mode::Normal, &[], None);
    assert_eq!(out.text(), "Please list the pros and cons of:\n\nremote work");
    assert!(find_command("/Translate").is_some());
    assert_eq!(QUICK_COMMANDS.len(), 8);
}

#[test]
fn commands_ignore_mode_and_pins() {
    let out = compose("/explain monads", Mode::Teacher, &["be brief".into()], None);
    assert!(!out.text().contains("System:"));
    assert!(!out.text().contains("be brief"));
}

#[test]
fn plain_query_gets_mode_instruction() {
    let out = compose("  what is rust?  ", Mode::Concise, &[], None);
    assert_eq!(
        out.text(),
        format!("System: {}\n\nUser: what is rust?", Mode::Concise.instruction())
    );
}

#[test]
fn pinned_context_is_listed_in_order() {
    let pins = vec!["I use Linux".to_string(), "Answer in German".to_string()];
    let out = compose("hello", Mode::Normal, &pins, None);
    assert_eq!(
        out.text(),
        format!(
            "System: {}\n\nPinned Context:\n- I use Linux\n- Answer in German\n\n\nUser: hello",
            Mode::Normal.instruction()
        )
    );
}

#[test]
fn history_is_replayed_in_multi_turn() {
    let mut ctx = ConversationContext::new(10);
    ctx.append(ConversationEntry::user("2+2?"));
    ctx.append(ConversationEntry::assistant("4", None));
    let out = compose("and times 3?", Mode::Normal, &[], Some(&ctx));
    assert!(out
        .text()
        .ends_with("\n\nUser: 2+2?\nAssistant: 4\nUser: and times 3?"));

    let empty = ConversationContext::new(10);
    let out = compose("first", Mode::Normal, &[], Some(&empty));
    assert!(out.text().ends_with("\n\nUser: first"));
}
