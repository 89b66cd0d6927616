//! Pose reporter
//!
//! Turns a telemetry sample into a report and sends it through the
//! transport guard. Failures end here: they are logged and counted, never
//! returned to the frame loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use tracing::{error, info, warn};

use super::payload::ReportPayload;
use super::throttle::TelemetrySample;
use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::transport::{HttpTransport, RequestSigner, SendOutcome, Transport, TransportGuard};

/// Local diagnostic outcome of one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Sent { status: u16 },
    Skipped,
    Failed(String),
}

/// Running totals of report outcomes
#[derive(Debug, Default)]
pub struct TelemetryStats {
    sent: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`TelemetryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryCounts {
    pub sent: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl TelemetryStats {
    fn record(&self, outcome: &ReportOutcome) {
        let counter = match outcome {
            ReportOutcome::Sent { .. } => &self.sent,
            ReportOutcome::Skipped => &self.skipped,
            ReportOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetryCounts {
        TelemetryCounts {
            sent: self.sent.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct PoseReporter<T: Transport> {
    guard: TransportGuard<T>,
    stats: Arc<TelemetryStats>,
}

impl PoseReporter<HttpTransport> {
    /// Reporter posting to the configured endpoint, signing when a secret is given
    pub fn from_config(config: &TelemetryConfig, secret: Option<&str>) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))?;
        let signer = secret.map(RequestSigner::new).transpose()?;
        let guard = TransportGuard::new(Arc::new(transport), config.endpoint.clone()).with_signer(signer);
        Ok(Self::new(guard))
    }
}

impl<T: Transport> PoseReporter<T> {
    pub fn new(guard: TransportGuard<T>) -> Self {
        Self {
            guard,
            stats: Arc::new(TelemetryStats::default()),
        }
    }

    pub fn guard(&self) -> &TransportGuard<T> {
        &self.guard
    }

    pub fn stats(&self) -> Arc<TelemetryStats> {
        Arc::clone(&self.stats)
    }

    /// Report one sample.
    ///
    /// Claims the in-flight slot immediately; the returned future resolves
    /// once the report settles and always yields an outcome.
    pub fn report(&self, sample: &TelemetrySample) -> BoxFuture<'static, ReportOutcome> {
        let stats = Arc::clone(&self.stats);

        let body = match ReportPayload::from(sample).to_body() {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, code = e.code(), "Refusing to send malformed pose report");
                let outcome = ReportOutcome::Failed(e.to_string());
                stats.record(&outcome);
                return future::ready(outcome).boxed();
            }
        };

        let send = self.guard.send(body);
        let timestamp = sample.timestamp;

        async move {
            let outcome = match send.await {
                Ok(SendOutcome::Delivered { status }) => {
                    info!(timestamp, status, "Pose data sent successfully");
                    ReportOutcome::Sent { status }
                }
                Ok(SendOutcome::Skipped) => {
                    info!(timestamp, "Skipped sending pose");
                    ReportOutcome::Skipped
                }
                Err(e) => {
                    if e.is_invariant_violation() {
                        error!(error = %e, code = e.code(), "Failed to send pose data");
                    } else {
                        warn!(error = %e, code = e.code(), "Failed to send pose data");
                    }
                    ReportOutcome::Failed(e.to_string())
                }
            };
            stats.record(&outcome);
            outcome
        }
        .boxed()
    }
}
