use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub requests_created_total: IntCounter,
    pub accepts_total: IntCounterVec,
    pub accept_latency_seconds: HistogramVec,
    pub transitions_total: IntCounterVec,
    pub location_samples_total: IntCounter,
    pub open_requests: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_created_total = IntCounter::new(
            "requests_created_total",
            "Total dispatch requests created",
        )
        .expect("valid requests_created_total metric");

        let accepts_total = IntCounterVec::new(
            Opts::new("accepts_total", "Acceptance attempts by outcome"),
            &["outcome"],
        )
        .expect("valid accepts_total metric");

        let accept_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "accept_latency_seconds",
                "Latency of acceptance attempts in seconds",
            ),
            &["outcome"],
        )
        .expect("valid accept_latency_seconds metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Lifecycle transitions by target status"),
            &["status"],
        )
        .expect("valid transitions_total metric");

        let location_samples_total = IntCounter::new(
            "location_samples_total",
            "Total provider position samples recorded",
        )
        .expect("valid location_samples_total metric");

        let open_requests = IntGauge::new(
            "open_requests",
            "Current number of requests awaiting acceptance",
        )
        .expect("valid open_requests metric");

        registry
            .register(Box::new(requests_created_total.clone()))
            .expect("register requests_created_total");
        registry
            .register(Box::new(accepts_total.clone()))
            .expect("register accepts_total");
        registry
            .register(Box::new(accept_latency_seconds.clone()))
            .expect("register accept_latency_seconds");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(location_samples_total.clone()))
            .expect("register location_samples_total");
        registry
            .register(Box::new(open_requests.clone()))
            .expect("register open_requests");

        Self {
            registry,
            requests_created_total,
            accepts_total,
            accept_latency_seconds,
            transitions_total,
            location_samples_total,
            open_requests,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
