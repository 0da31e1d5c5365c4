//! Request sequencing
//!
//! Two rules keep what the user sees consistent:
//! - a form runs at most one submission at a time ([`SubmitGate`])
//! - only the most recently started submission may publish its result
//!   ([`ResultBoard`]); anything older that resolves later is discarded

use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};
use voxscreen_common::{Normalizer, PredictionResult};

use crate::error::{AnalysisError, TransportError};
use crate::transport::PredictionTransport;

/// Position of a submission in start order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

/// Whether a settled result reached the display
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Result is now the displayed one
    Shown(PredictionResult),
    /// A newer submission was started meanwhile; result was not displayed
    Superseded(PredictionResult),
}

impl SubmitOutcome {
    pub fn result(&self) -> &PredictionResult {
        match self {
            SubmitOutcome::Shown(result) | SubmitOutcome::Superseded(result) => result,
        }
    }

    pub fn is_shown(&self) -> bool {
        matches!(self, SubmitOutcome::Shown(_))
    }
}

/// The currently displayed result plus the ticket counter
#[derive(Debug, Default)]
pub struct ResultBoard {
    issued: AtomicU64,
    current: Mutex<Option<(Ticket, PredictionResult)>>,
}

impl ResultBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new submission; it becomes the only one allowed to publish
    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Show `result` unless a newer ticket has been issued since `ticket`
    pub fn publish(&self, ticket: Ticket, result: PredictionResult) -> SubmitOutcome {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        let latest = Ticket(self.issued.load(Ordering::SeqCst));
        if ticket != latest {
            debug!(?ticket, ?latest, "Discarding stale result");
            return SubmitOutcome::Superseded(result);
        }

        *current = Some((ticket, result.clone()));
        SubmitOutcome::Shown(result)
    }

    /// Displayed result, if any
    pub fn current(&self) -> Option<PredictionResult> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, result)| result.clone())
    }

    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Per-form "submitting" flag
#[derive(Debug, Default)]
pub struct SubmitGate {
    busy: AtomicBool,
}

impl SubmitGate {
    /// Claim the form for one submission
    pub fn try_acquire(&self) -> Result<InFlightGuard<'_>, AnalysisError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AnalysisError::Busy)?;
        Ok(InFlightGuard { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the lifetime of one submission; releases the gate on drop
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    gate: &'a SubmitGate,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Shared analysis context for every form on a page
pub struct Analyzer {
    transport: Arc<dyn PredictionTransport>,
    normalizer: Normalizer,
    board: ResultBoard,
}

impl Analyzer {
    pub fn new(transport: Arc<dyn PredictionTransport>, normalizer: Normalizer) -> Self {
        Self {
            transport,
            normalizer,
            board: ResultBoard::new(),
        }
    }

    pub fn transport(&self) -> &dyn PredictionTransport {
        self.transport.as_ref()
    }

    pub fn board(&self) -> &ResultBoard {
        &self.board
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Run one submission through gate, transport, normalizer and board
    ///
    /// The gate is held until this returns, whichever way it returns.
    /// Failures leave the displayed result untouched.
    pub async fn run<F>(&self, gate: &SubmitGate, request: F) -> Result<SubmitOutcome, AnalysisError>
    where
        F: Future<Output = Result<Value, TransportError>>,
    {
        let in_flight = gate.try_acquire()?;
        self.run_claimed(in_flight, request).await
    }

    /// Like [`Analyzer::run`] for a caller that already holds the gate
    ///
    /// The guard is released when this returns.
    pub async fn run_claimed<F>(
        &self,
        _in_flight: InFlightGuard<'_>,
        request: F,
    ) -> Result<SubmitOutcome, AnalysisError>
    where
        F: Future<Output = Result<Value, TransportError>>,
    {
        let ticket = self.board.issue();

        let raw = request.await?;
        let result = self.normalizer.normalize(&raw)?;
        info!(
            verdict = %result.verdict,
            probability = %result.probability.percent_label(),
            "Analysis complete"
        );

        Ok(self.board.publish(ticket, result))
    }

    /// Submit and normalize audio without touching the board
    pub async fn analyze_detached(
        &self,
        upload: &crate::transport::AudioUpload,
    ) -> Result<PredictionResult, AnalysisError> {
        let raw = self.transport.analyze_audio(upload).await?;
        Ok(self.normalizer.normalize(&raw)?)
    }
}
