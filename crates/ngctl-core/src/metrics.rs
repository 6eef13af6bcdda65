//! Prometheus projection of parsed stats.
//!
//! Each [`Stat`] becomes one counter sample. Samples are grouped into one
//! family per stat type, named `syslogng_<type>_total`, and labelled with the
//! source coordinates and state:
//!
//! ```text
//! # TYPE syslogng_processed_total counter
//! syslogng_processed_total{source_name="src",source_id="s_file#0",source_instance="",type="processed",state="a"} 1234
//! ```
//!
//! Families appear in the order their type first occurs in the input and
//! samples keep input order, so successive scrapes diff cleanly.

use std::collections::HashMap;

use prometheus::proto::{Counter, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

use crate::stats::Stat;

/// Prefix applied to every family name.
pub const METRIC_PREFIX: &str = "syslogng_";

pub const LABEL_SOURCE_NAME: &str = "source_name";
pub const LABEL_SOURCE_ID: &str = "source_id";
pub const LABEL_SOURCE_INSTANCE: &str = "source_instance";
pub const LABEL_TYPE: &str = "type";
pub const LABEL_STATE: &str = "state";

/// Errors from rendering metric families.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("prometheus encoding failed: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("encoded metrics are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Family name for a stat type: prefixed, restricted to `[a-zA-Z0-9_:]`,
/// with a `_total` suffix.
pub fn metric_name(kind: &str) -> String {
    let mut name = String::with_capacity(METRIC_PREFIX.len() + kind.len() + "_total".len());
    name.push_str(METRIC_PREFIX);
    if kind.is_empty() {
        name.push_str("stat");
    }
    name.extend(kind.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
            c
        } else {
            '_'
        }
    }));
    name.push_str("_total");
    name
}

fn label(name: &str, value: &str) -> LabelPair {
    let mut pair = LabelPair::default();
    pair.set_name(name.to_string());
    pair.set_value(value.to_string());
    pair
}

fn sample(stat: &Stat) -> Metric {
    let mut counter = Counter::default();
    counter.set_value(stat.number as f64);

    let mut metric = Metric::from_label(vec![
        label(LABEL_SOURCE_NAME, &stat.source_name),
        label(LABEL_SOURCE_ID, &stat.source_id),
        label(LABEL_SOURCE_INSTANCE, &stat.source_instance),
        label(LABEL_TYPE, &stat.kind),
        label(LABEL_STATE, &stat.source_state.to_string()),
    ]);
    metric.set_counter(counter);
    metric
}

/// Group stats into counter families, one sample per stat.
pub fn stats_to_families(stats: &[Stat]) -> Vec<MetricFamily> {
    let mut order: Vec<(String, &str, Vec<Metric>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for stat in stats {
        let name = metric_name(&stat.kind);
        let slot = match index.get(&name) {
            Some(&slot) => slot,
            None => {
                index.insert(name.clone(), order.len());
                order.push((name, stat.kind.as_str(), Vec::new()));
                order.len() - 1
            }
        };
        order[slot].2.push(sample(stat));
    }

    order
        .into_iter()
        .map(|(name, kind, metrics)| {
            let mut family = MetricFamily::default();
            family.set_name(name);
            family.set_help(format!("syslog-ng {kind} counter"));
            family.set_field_type(MetricType::COUNTER);
            family.set_metric(metrics);
            family
        })
        .collect()
}

/// Write families in the Prometheus text exposition format.
pub fn write_text<W: std::io::Write>(
    families: &[MetricFamily],
    writer: &mut W,
) -> Result<(), EncodeError> {
    TextEncoder::new().encode(families, writer)?;
    Ok(())
}

/// Render families in the Prometheus text exposition format.
pub fn encode_text(families: &[MetricFamily]) -> Result<String, EncodeError> {
    let mut buf = Vec::new();
    write_text(families, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
