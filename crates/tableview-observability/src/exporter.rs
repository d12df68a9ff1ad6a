use prometheus::{Encoder, TextEncoder};

use crate::metrics::{self, REGISTRY};

/// Render every registered metric in the Prometheus text exposition format.
///
/// Registers the metrics first if nobody has yet, so the output is never
/// empty just because `init()` was skipped.
pub fn gather_text() -> prometheus::Result<String> {
    metrics::init();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
