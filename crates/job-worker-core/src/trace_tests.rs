use super::*;

#[test]
fn extract_context_with_no_traceparent_yields_empty_context() {
    let cx = extract_context(None, None);
    assert!(!cx.span().span_context().is_valid());
}

#[test]
fn extract_context_with_malformed_traceparent_yields_empty_context() {
    let cx = extract_context(Some("not-a-traceparent"), None);
    assert!(!cx.span().span_context().is_valid());
}

#[test]
fn extract_context_round_trips_a_valid_traceparent() {
    let traceparent = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
    let cx = extract_context(Some(traceparent), None);
    let span_context = cx.span().span_context();
    assert!(span_context.is_valid());
    assert_eq!(
        span_context.trace_id().to_string(),
        "4bf92f3577b34da6a3ce929d0e0e4736"
    );
    assert_eq!(span_context.span_id().to_string(), "00f067aa0ba902b7");
}

#[test]
fn inject_traceparent_on_empty_context_yields_none() {
    assert!(inject_traceparent(&Context::new()).is_none());
}

#[test]
fn link_entity_contexts_skips_invalid_entries_and_keeps_valid_ones() {
    let task = (
        Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        None,
    );
    let stage = (None, None);
    let job = (Some("garbage"), None);

    let links = link_entity_contexts(task, stage, job);

    assert_eq!(links.len(), 1);
}
