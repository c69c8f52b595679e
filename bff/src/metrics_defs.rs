use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, handler.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const SOURCE_REQUEST_DURATION: MetricDef = MetricDef {
    name: "source.request.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single source call in seconds. Tagged with source, outcome.",
};

pub const SOURCE_FAILURES: MetricDef = MetricDef {
    name: "source.failures",
    metric_type: MetricType::Counter,
    description: "Source calls that settled as a failure. Tagged with source.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    SOURCE_REQUEST_DURATION,
    SOURCE_FAILURES,
];
