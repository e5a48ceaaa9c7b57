//! Formatting layers
//!
//! Console and file output share the same JSONL layout so that both can be
//! fed to the same log aggregation tooling.

use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;

use crate::config::JsonFields;

/// Create a JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(writer: W, fields: &JsonFields) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup> + 'static,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(fields.current_span)
        .with_span_list(fields.span_list)
        .flatten_event(fields.flatten)
        .with_file(fields.source_location)
        .with_line_number(fields.source_location)
        .with_thread_ids(fields.threads)
        .with_thread_names(fields.threads)
        .with_writer(writer)
}

/// Create a human-readable console layer
pub fn pretty_layer<S>(ansi: bool) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup> + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_writer(std::io::stderr)
}
