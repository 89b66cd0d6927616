//! Single in-flight request guard
//!
//! At most one telemetry request is outstanding at a time. Attempts made
//! while one is in flight are dropped, not queued. The slot is taken at the
//! moment `send` is called, before any suspension point, and released by a
//! permit that clears it when the request settles, fails, or is dropped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use tracing::debug;

use super::client::{OutboundRequest, Transport};
use super::signing::RequestSigner;
use crate::error::{Error, Result};

/// Outcome of a send attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The collector accepted the report
    Delivered { status: u16 },
    /// Another request was in flight; nothing was sent
    Skipped,
}

/// Shared single-slot occupancy flag
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    slot: Arc<AtomicBool>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if it is already taken
    pub fn try_acquire(&self) -> Option<InFlightPermit> {
        self.slot
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightPermit {
                slot: Arc::clone(&self.slot),
                released: false,
            })
    }

    pub fn is_occupied(&self) -> bool {
        self.slot.load(Ordering::Acquire)
    }
}

/// Holds the in-flight slot; the slot is cleared when this is dropped
pub struct InFlightPermit {
    slot: Arc<AtomicBool>,
    released: bool,
}

impl InFlightPermit {
    /// Explicitly release the slot (normally done automatically on drop)
    pub fn release(mut self) {
        self.do_release();
    }

    fn do_release(&mut self) {
        if !self.released {
            self.released = true;
            self.slot.store(false, Ordering::Release);
        }
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.do_release();
    }
}

impl fmt::Debug for InFlightPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightPermit")
            .field("released", &self.released)
            .finish()
    }
}

/// Coalescing, optionally authenticated wrapper around a [`Transport`]
pub struct TransportGuard<T: Transport> {
    transport: Arc<T>,
    endpoint: String,
    signer: Option<RequestSigner>,
    in_flight: InFlightGuard,
}

impl<T: Transport> fmt::Debug for TransportGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportGuard")
            .field("endpoint", &self.endpoint)
            .field("signed", &self.signer.is_some())
            .field("in_flight", &self.in_flight.is_occupied())
            .finish()
    }
}

impl<T: Transport> TransportGuard<T> {
    pub fn new(transport: Arc<T>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            signer: None,
            in_flight: InFlightGuard::new(),
        }
    }

    /// Sign every request with this signer
    pub fn with_signer(mut self, signer: Option<RequestSigner>) -> Self {
        self.signer = signer;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_signed(&self) -> bool {
        self.signer.is_some()
    }

    pub fn in_flight(&self) -> &InFlightGuard {
        &self.in_flight
    }

    /// Send `body` unless a request is already outstanding.
    ///
    /// The in-flight check happens synchronously in this call; the returned
    /// future performs signing and delivery. Signing and transport failures
    /// are returned as errors and still release the slot.
    pub fn send(&self, body: String) -> BoxFuture<'static, Result<SendOutcome>> {
        let Some(permit) = self.in_flight.try_acquire() else {
            debug!(endpoint = %self.endpoint, "Request already in flight, dropping send");
            return future::ready(Ok(SendOutcome::Skipped)).boxed();
        };

        let transport = Arc::clone(&self.transport);
        let signer = self.signer.clone();
        let mut request = OutboundRequest::json(self.endpoint.clone(), body);

        async move {
            let _permit = permit;
            if let Some(signer) = signer {
                request.authorization = Some(signer.authorization(request.body.as_bytes())?);
            }
            let status = transport.post(request).await?;
            Ok::<_, Error>(SendOutcome::Delivered { status })
        }
        .boxed()
    }
}
