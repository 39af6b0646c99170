//! Prometheus instruments for the DevTools connection.
//!
//! Instruments live in a registry owned by this module; [`registry`] exposes it for
//! exporters and [`snapshot`] folds it into plain numbers for logs.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::proto::MetricFamily;
use prometheus::{histogram_opts, opts, HistogramVec, IntCounter, IntCounterVec, Registry};
use tracing::error;

const COMMANDS: &str = "pagewatch_cdp_commands_total";
const FAILURES: &str = "pagewatch_cdp_command_failures_total";
const LATENCY: &str = "pagewatch_cdp_command_duration_seconds";
const LOADS: &str = "pagewatch_cdp_load_events_total";
const FRAMES: &str = "pagewatch_cdp_screencast_frames_total";

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterMetricsSnapshot {
    pub commands: u64,
    pub command_failures: u64,
    pub command_latency_total_us: u64,
    pub load_events: u64,
    pub screencast_frames: u64,
}

struct Instruments {
    registry: Registry,
    commands: IntCounterVec,
    failures: IntCounterVec,
    latency: HistogramVec,
    loads: IntCounter,
    frames: IntCounter,
}

impl Instruments {
    fn build() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let commands = IntCounterVec::new(opts!(COMMANDS, "CDP commands sent"), &["method"])?;
        let failures =
            IntCounterVec::new(opts!(FAILURES, "CDP commands that failed"), &["method"])?;
        let latency = HistogramVec::new(
            histogram_opts!(
                LATENCY,
                "CDP command round-trip latency",
                vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]
            ),
            &["method"],
        )?;
        let loads = IntCounter::new(LOADS, "Page load events observed")?;
        let frames = IntCounter::new(FRAMES, "Screencast frames received")?;

        registry.register(Box::new(commands.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(loads.clone()))?;
        registry.register(Box::new(frames.clone()))?;

        Ok(Self {
            registry,
            commands,
            failures,
            latency,
            loads,
            frames,
        })
    }
}

lazy_static! {
    static ref INSTRUMENTS: Option<Instruments> = match Instruments::build() {
        Ok(instruments) => Some(instruments),
        Err(err) => {
            error!(target: "cdp-adapter", %err, "cdp metrics disabled");
            None
        }
    };
}

/// The registry holding every cdp instrument, if they could be created.
pub fn registry() -> Option<&'static Registry> {
    INSTRUMENTS.as_ref().map(|m| &m.registry)
}

pub fn record_command(method: &str, duration: Duration) {
    if let Some(m) = INSTRUMENTS.as_ref() {
        m.commands.with_label_values(&[method]).inc();
        m.latency
            .with_label_values(&[method])
            .observe(duration.as_secs_f64());
    }
}

pub fn record_command_failure(method: &str) {
    if let Some(m) = INSTRUMENTS.as_ref() {
        m.failures.with_label_values(&[method]).inc();
    }
}

pub fn record_load_event() {
    if let Some(m) = INSTRUMENTS.as_ref() {
        m.loads.inc();
    }
}

pub fn record_screencast_frame() {
    if let Some(m) = INSTRUMENTS.as_ref() {
        m.frames.inc();
    }
}

/// Totals across all label values.
pub fn snapshot() -> AdapterMetricsSnapshot {
    let Some(registry) = registry() else {
        return AdapterMetricsSnapshot::default();
    };
    let mut snap = AdapterMetricsSnapshot::default();
    for family in registry.gather() {
        match family.get_name() {
            COMMANDS => snap.commands = counter_total(&family),
            FAILURES => snap.command_failures = counter_total(&family),
            LOADS => snap.load_events = counter_total(&family),
            FRAMES => snap.screencast_frames = counter_total(&family),
            LATENCY => {
                let seconds: f64 = family
                    .get_metric()
                    .iter()
                    .map(|metric| metric.get_histogram().get_sample_sum())
                    .sum();
                snap.command_latency_total_us = (seconds * 1_000_000.0).round() as u64;
            }
            _ => {}
        }
    }
    snap
}

fn counter_total(family: &MetricFamily) -> u64 {
    family
        .get_metric()
        .iter()
        .map(|metric| metric.get_counter().get_value() as u64)
        .sum()
}
