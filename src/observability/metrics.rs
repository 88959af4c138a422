use prometheus::{
    Encoder, GaugeVec, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_total: IntCounterVec,
    pub jobs_in_queue: IntGauge,
    pub dispatch_latency_seconds: HistogramVec,
    pub driver_load: GaugeVec,
    pub status_transitions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_total = IntCounterVec::new(
            Opts::new("dispatch_total", "Dispatch attempts by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_total metric");

        let jobs_in_queue = IntGauge::new(
            "jobs_in_queue",
            "Current number of jobs waiting for dispatch",
        )
        .expect("valid jobs_in_queue metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of dispatch processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let driver_load = GaugeVec::new(
            Opts::new("driver_load", "Driver load ratio against rule ceiling [0..1]"),
            &["driver_id"],
        )
        .expect("valid driver_load metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Accepted job status transitions by target status",
            ),
            &["to"],
        )
        .expect("valid status_transitions_total metric");

        registry
            .register(Box::new(dispatch_total.clone()))
            .expect("register dispatch_total");
        registry
            .register(Box::new(jobs_in_queue.clone()))
            .expect("register jobs_in_queue");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(driver_load.clone()))
            .expect("register driver_load");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");

        Self {
            registry,
            dispatch_total,
            jobs_in_queue,
            dispatch_latency_seconds,
            driver_load,
            status_transitions_total,
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
