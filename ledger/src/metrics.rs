//! # Prometheus Metrics
//!
//! Operational counters for a single ledger. Each [`VaultLedger`](crate::ledger::VaultLedger)
//! owns its own [`prometheus::Registry`] (namespace `vault`) so several
//! ledgers in one process do not collide. A host that serves `/metrics`
//! renders it with [`VaultMetrics::encode`].

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Metric handles for one ledger.
///
/// Cloning is cheap: prometheus handles are reference counted internally.
#[derive(Clone)]
pub struct VaultMetrics {
    registry: Registry,
    /// Committed deposits.
    pub deposits_total: IntCounter,
    /// Committed withdrawals (transfer succeeded).
    pub withdrawals_total: IntCounter,
    /// Rejected operations, labelled by error kind.
    pub rejections_total: IntCounterVec,
    /// Withdrawals rolled back because the outbound transfer failed.
    pub transfer_failures_total: IntCounter,
    /// Current custodied value.
    pub total_vaulted: IntGauge,
    /// Value debited but not yet settled by the channel.
    pub in_flight: IntGauge,
}

impl VaultMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("vault".into()), None)
            .expect("failed to create prometheus registry");

        let deposits_total = IntCounter::new("deposits_total", "Total committed deposits")
            .expect("metric creation");
        registry
            .register(Box::new(deposits_total.clone()))
            .expect("metric registration");

        let withdrawals_total =
            IntCounter::new("withdrawals_total", "Total committed withdrawals")
                .expect("metric creation");
        registry
            .register(Box::new(withdrawals_total.clone()))
            .expect("metric registration");

        let rejections_total = IntCounterVec::new(
            Opts::new("rejections_total", "Operations rejected, by reason"),
            &["reason"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(rejections_total.clone()))
            .expect("metric registration");

        let transfer_failures_total = IntCounter::new(
            "transfer_failures_total",
            "Withdrawals rolled back after a failed outbound transfer",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transfer_failures_total.clone()))
            .expect("metric registration");

        let total_vaulted = IntGauge::new("total_vaulted", "Value currently held in custody")
            .expect("metric creation");
        registry
            .register(Box::new(total_vaulted.clone()))
            .expect("metric registration");

        let in_flight = IntGauge::new(
            "in_flight",
            "Value debited by withdrawals whose transfer is still pending",
        )
        .expect("metric creation");
        registry
            .register(Box::new(in_flight.clone()))
            .expect("metric registration");

        Self {
            registry,
            deposits_total,
            withdrawals_total,
            rejections_total,
            transfer_failures_total,
            total_vaulted,
            in_flight,
        }
    }

    /// Bumps the rejection counter for `reason`.
    pub(crate) fn reject(&self, reason: &str) {
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for VaultMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VaultMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultMetrics")
            .field("deposits_total", &self.deposits_total.get())
            .field("withdrawals_total", &self.withdrawals_total.get())
            .field("total_vaulted", &self.total_vaulted.get())
            .finish()
    }
}
