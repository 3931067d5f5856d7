//! W3C trace context propagation (§4.6, §13.2).
//!
//! Every created entity carries the producing span's context in its
//! `traceparent`/`tracestate` fields so server-side storage preserves it;
//! every dequeued task's span is linked back to the contexts of its task,
//! stage, and job records. Built on `opentelemetry` + `opentelemetry_sdk`'s
//! `TraceContextPropagator`, the same W3C propagator the teacher's workspace
//! already depended on.

use std::collections::HashMap;

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// Carrier used to move trace headers into/out of a plain `HashMap`, the
/// shape entity records use for `traceparent`/`tracestate`.
#[derive(Default)]
struct HeaderCarrier(HashMap<String, String>);

impl Injector for HeaderCarrier {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key.to_owned(), value);
    }
}

impl Extractor for HeaderCarrier {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

/// Serialize the given context's span into a W3C `traceparent` header,
/// returning `None` when the context carries no valid span (e.g. no tracer
/// was ever configured).
pub fn inject_traceparent(cx: &Context) -> Option<String> {
    if !cx.span().span_context().is_valid() {
        return None;
    }
    let propagator = TraceContextPropagator::new();
    let mut carrier = HeaderCarrier::default();
    propagator.inject_context(cx, &mut carrier);
    carrier.0.remove("traceparent")
}

/// Convenience wrapper around [`inject_traceparent`] for the context active
/// on the calling task at the time of the call (§4.6, "the current trace
/// context is injected... at creation time").
pub fn current_traceparent() -> Option<String> {
    inject_traceparent(&Context::current())
}

/// Parse a `traceparent`/`tracestate` pair previously stored on an entity
/// back into an [`opentelemetry::Context`] usable as a span parent or link
/// target. An absent or malformed `traceparent` yields the current (empty)
/// context rather than an error — callers extracting historical records
/// should not fail a dequeue over unparseable trace metadata.
pub fn extract_context(traceparent: Option<&str>, tracestate: Option<&str>) -> Context {
    let Some(traceparent) = traceparent else {
        return Context::new();
    };
    let mut fields = HashMap::new();
    fields.insert("traceparent".to_owned(), traceparent.to_owned());
    if let Some(tracestate) = tracestate {
        fields.insert("tracestate".to_owned(), tracestate.to_owned());
    }
    let carrier = HeaderCarrier(fields);
    TraceContextPropagator::new().extract(&carrier)
}

/// Build span links from a dequeued task's own trace context plus its
/// stage's and job's, so the per-task execution span stays traceable back
/// to every ancestor record even though each may have been created by a
/// different, unrelated trace (§4.6, "attaching `addLink` relations").
pub fn link_entity_contexts(
    task: (Option<&str>, Option<&str>),
    stage: (Option<&str>, Option<&str>),
    job: (Option<&str>, Option<&str>),
) -> Vec<opentelemetry::trace::Link> {
    [task, stage, job]
        .into_iter()
        .filter_map(|(traceparent, tracestate)| {
            let cx = extract_context(traceparent, tracestate);
            let span_context = cx.span().span_context().clone();
            span_context.is_valid().then(|| {
                opentelemetry::trace::Link::new(span_context, Vec::new(), 0)
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
