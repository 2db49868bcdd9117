//! Metrics setup and update for the shim.

use prometheus::core::{AtomicI64, AtomicU64, GenericCounter, GenericGauge};

#[derive(Debug, Clone)]
pub struct Metrics {
    pub query_total: GenericCounter<AtomicU64>,
    pub query_error_total: GenericCounter<AtomicU64>,
    pub active_sessions: GenericGauge<AtomicI64>,
    pub pool_size: GenericGauge<AtomicI64>,
    pub pool_idle_count: GenericGauge<AtomicI64>,
    pub pool_active_count: GenericGauge<AtomicI64>,
    pub pool_max_connections: GenericGauge<AtomicI64>,
}

/// Create a new int counter metric and register it with the provided Prometheus Registry
fn add_int_counter_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericCounter<AtomicU64>, prometheus::Error> {
    let int_counter =
        prometheus::IntCounter::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(int_counter.clone()))?;
    Ok(int_counter)
}

/// Create a new int gauge metric and register it with the provided Prometheus Registry
fn add_int_gauge_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericGauge<AtomicI64>, prometheus::Error> {
    let int_gauge =
        prometheus::IntGauge::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(int_gauge.clone()))?;
    Ok(int_gauge)
}

/// Setup counters and gauges used to produce Prometheus metrics
pub fn initialise_metrics(
    metrics_registry: &mut prometheus::Registry,
) -> Result<Metrics, prometheus::Error> {
    let query_total = add_int_counter_metric(
        metrics_registry,
        "pgshim_query_total",
        "Total successful queries.",
    )?;

    let query_error_total = add_int_counter_metric(
        metrics_registry,
        "pgshim_query_error_total",
        "Total queries that returned an error.",
    )?;

    let active_sessions = add_int_gauge_metric(
        metrics_registry,
        "pgshim_active_sessions",
        "The number of open WebSocket sessions, each holding a dedicated connection.",
    )?;

    let pool_size = add_int_gauge_metric(
        metrics_registry,
        "pgshim_pool_size",
        "The number of connections currently active. This includes idle connections.",
    )?;

    let pool_idle_count = add_int_gauge_metric(
        metrics_registry,
        "pgshim_pool_idle",
        "The number of connections active and idle (not in use).",
    )?;

    let pool_active_count = add_int_gauge_metric(
        metrics_registry,
        "pgshim_pool_active",
        "The number of connections current active. This does not include idle connections.",
    )?;

    let pool_max_connections = add_int_gauge_metric(
        metrics_registry,
        "pgshim_pool_max_connections",
        "The maximum number of connections that this pool should maintain.",
    )?;

    Ok(Metrics {
        query_total,
        query_error_total,
        active_sessions,
        pool_size,
        pool_idle_count,
        pool_active_count,
        pool_max_connections,
    })
}

impl Metrics {
    /// Record the outcome of one request.
    pub fn record_query<T, E>(&self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.query_total.inc(),
            Err(_) => self.query_error_total.inc(),
        }
    }

    // update all pool gauges
    pub fn update_pool_metrics(&self, pool: &sqlx::PgPool) {
        let pool_size: i64 = pool.size().into();
        self.pool_size.set(pool_size);

        let pool_idle: i64 = i64::try_from(pool.num_idle()).unwrap_or(i64::MAX);
        self.pool_idle_count.set(pool_idle);

        self.pool_active_count.set(pool_size - pool_idle);

        let max_connections: i64 = pool.options().get_max_connections().into();
        self.pool_max_connections.set(max_connections);
    }
}
