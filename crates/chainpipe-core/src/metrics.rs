//! Pipeline metric instruments.
//!
//! Reported through the OpenTelemetry global meter so embedders choose the
//! exporter (OTLP, Prometheus bridge, none). With no meter provider
//! installed the instruments are no-ops.

use std::time::Duration;

use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};

static METER: Lazy<Meter> = Lazy::new(|| global::meter("chainpipe"));

static TASK_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("indexer_pipeline_task_duration")
        .with_description("The total time spent processing an indexing task")
        .with_unit("s")
        .build()
});

static STAGE_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("indexer_pipeline_stage_duration")
        .with_description("The total time spent processing an indexing stage")
        .with_unit("s")
        .build()
});

static HEIGHT_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("indexer_pipeline_height_duration")
        .with_description("The total time spent indexing a height")
        .with_unit("s")
        .build()
});

static HEIGHTS_TOTAL: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("indexer_pipeline_heights_total")
        .with_description("The total number of successfully indexed heights")
        .build()
});

static ERRORS_TOTAL: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("indexer_pipeline_errors_total")
        .with_description("The total number of indexing errors")
        .build()
});

pub(crate) fn observe_task_duration(task: &str, elapsed: Duration) {
    TASK_DURATION.record(
        elapsed.as_secs_f64(),
        &[KeyValue::new("task", task.to_string())],
    );
}

pub(crate) fn observe_stage_duration(stage: &str, elapsed: Duration) {
    STAGE_DURATION.record(
        elapsed.as_secs_f64(),
        &[KeyValue::new("stage", stage.to_string())],
    );
}

pub(crate) fn observe_height_duration(elapsed: Duration) {
    HEIGHT_DURATION.record(elapsed.as_secs_f64(), &[]);
}

pub(crate) fn inc_heights_total() {
    HEIGHTS_TOTAL.add(1, &[]);
}

pub(crate) fn inc_errors_total() {
    ERRORS_TOTAL.add(1, &[]);
}
