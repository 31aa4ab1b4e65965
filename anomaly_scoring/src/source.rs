use log::debug;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::*;

/// Everything the pipeline reads for one request.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Snapshot {
    pub reporting_units: Vec<ReportingUnit>,
    pub vote_counts: Vec<VoteCount>,
}

/// Flips the cancellation flag of a [`FetchControl`], possibly from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A deadline and a cancellation flag for one analysis request.
///
/// The observation source checks it while reading, and the pipeline checks it
/// between stages and between analysis units.
#[derive(Debug, Clone)]
pub struct FetchControl {
    deadline: Option<Instant>,
    cancel: CancelHandle,
}

impl FetchControl {
    /// No deadline. Can still be cancelled.
    pub fn unbounded() -> FetchControl {
        FetchControl {
            deadline: None,
            cancel: CancelHandle::default(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> FetchControl {
        FetchControl {
            deadline: Some(Instant::now() + timeout),
            cancel: CancelHandle::default(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Fails if the request was cancelled or ran past its deadline.
    ///
    /// Cancellation wins over the deadline.
    pub fn checkpoint(&self) -> Result<(), AnalysisErrors> {
        if self.cancel.is_cancelled() {
            return Err(AnalysisErrors::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(AnalysisErrors::TimedOut),
            _ => Ok(()),
        }
    }
}

impl Default for FetchControl {
    fn default() -> Self {
        FetchControl::unbounded()
    }
}

/// The read-only store of reporting units and vote counts.
///
/// Implementations should report transient failures as [`AnalysisErrors::Fetch`] and
/// call [`FetchControl::checkpoint`] regularly while reading.
pub trait ObservationSource {
    fn fetch(
        &self,
        request: &AnalysisRequest,
        control: &FetchControl,
    ) -> Result<Snapshot, AnalysisErrors>;
}

/// A source backed by a snapshot held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    snapshot: Snapshot,
}

impl InMemorySource {
    pub fn new(snapshot: Snapshot) -> InMemorySource {
        InMemorySource { snapshot }
    }
}

impl ObservationSource for InMemorySource {
    fn fetch(
        &self,
        request: &AnalysisRequest,
        control: &FetchControl,
    ) -> Result<Snapshot, AnalysisErrors> {
        control.checkpoint()?;
        let vote_counts: Vec<VoteCount> = self
            .snapshot
            .vote_counts
            .iter()
            .filter(|vc| request.contest.map_or(true, |c| vc.contest == c))
            .cloned()
            .collect();
        debug!(
            "InMemorySource::fetch: {} of {} vote counts",
            vote_counts.len(),
            self.snapshot.vote_counts.len()
        );
        Ok(Snapshot {
            reporting_units: self.snapshot.reporting_units.clone(),
            vote_counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_passes() {
        assert_eq!(FetchControl::unbounded().checkpoint(), Ok(()));
        assert_eq!(
            FetchControl::with_timeout(Duration::from_secs(3600)).checkpoint(),
            Ok(())
        );
    }

    #[test]
    fn expired_deadline_is_retryable() {
        let control = FetchControl::with_timeout(Duration::ZERO);
        let err = control.checkpoint().unwrap_err();
        assert_eq!(err, AnalysisErrors::TimedOut);
        assert!(err.is_retryable());
    }

    #[test]
    fn cancel_from_another_thread() {
        let control = FetchControl::with_timeout(Duration::ZERO);
        let handle = control.cancel_handle();
        std::thread::spawn(move || handle.cancel()).join().unwrap();
        let err = control.checkpoint().unwrap_err();
        assert_eq!(err, AnalysisErrors::Cancelled);
        assert!(!err.is_retryable());
    }

    #[test]
    fn in_memory_filters_contest() {
        let vc = |contest: u64| VoteCount {
            reporting_unit: ReportingUnitId(1),
            contest: ContestId(contest),
            contest_name: format!("Contest {}", contest),
            candidate: CandidateId(1),
            selection_name: "A".to_string(),
            vote_category: VoteCategory::Total,
            count: 10,
        };
        let source = InMemorySource::new(Snapshot {
            reporting_units: vec![],
            vote_counts: vec![vc(1), vc(2), vc(1)],
        });
        let mut request = AnalysisRequest {
            election: "General".to_string(),
            jurisdiction: ReportingUnitId(1),
            subdivision_type: None,
            contest: Some(ContestId(1)),
        };
        let snap = source.fetch(&request, &FetchControl::unbounded()).unwrap();
        assert_eq!(snap.vote_counts.len(), 2);
        request.contest = None;
        let snap = source.fetch(&request, &FetchControl::unbounded()).unwrap();
        assert_eq!(snap.vote_counts.len(), 3);
    }
}
