// src/metrics.rs
//
// Thin facade over the `metrics` crate. With the `observability` feature
// disabled every hook compiles to a no-op, so the hot path carries no cost.

pub fn record_multicall_batch_size(size: f64) {
    #[cfg(feature = "observability")]
    metrics::histogram!("multicall_batch_size", size);
    #[cfg(not(feature = "observability"))]
    let _ = size;
}

pub fn increment_rpc_call(method: &'static str) {
    #[cfg(feature = "observability")]
    metrics::counter!("rpc_calls_total", 1, "method" => method);
    #[cfg(not(feature = "observability"))]
    let _ = method;
}
