//! Fetch lifecycle for the loan list: loading and error state, last-write-wins
//! ordering and refetching when the filters change.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use futures::future::BoxFuture;
use shared::domain::{DashboardSummary, LoanDetail, LoanId, PaymentSchedule, Record};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    aggregate::{aggregate, LoanAggregates},
    classify::{classify, ClassifiedError},
    details::DetailSelection,
    endpoint::resolve,
    filters::{FilterState, DEFAULT_SEARCH_DEBOUNCE},
    repository::{FetchFailure, LoanRepository},
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryState {
    /// Server response order.
    pub records: Vec<Record>,
    pub loading: bool,
    pub error: Option<ClassifiedError>,
    pub has_fetched_once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

impl QueryState {
    pub fn phase(&self) -> QueryPhase {
        if self.loading {
            QueryPhase::Loading
        } else if !self.has_fetched_once {
            QueryPhase::Idle
        } else if self.error.is_some() {
            QueryPhase::Failed
        } else {
            QueryPhase::Loaded
        }
    }

    fn settled(result: Result<Vec<Record>, ClassifiedError>) -> Self {
        match result {
            Ok(records) => Self {
                records,
                loading: false,
                error: None,
                has_fetched_once: true,
            },
            Err(error) => Self {
                records: Vec::new(),
                loading: false,
                error: Some(error),
                has_fetched_once: true,
            },
        }
    }
}

/// What happened to a settled fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer fetch was issued before this one settled; its result was dropped.
    Superseded,
}

pub struct QueryCoordinator {
    filters: FilterState,
    repository: Arc<dyn LoanRepository>,
    state: watch::Sender<QueryState>,
    latest_issued: AtomicU64,
    detail: DetailSelection,
}

impl QueryCoordinator {
    pub fn new(repository: Arc<dyn LoanRepository>) -> Arc<Self> {
        Self::with_search_debounce(repository, DEFAULT_SEARCH_DEBOUNCE)
    }

    /// Coordinator whose filters debounce search input by `search_debounce`.
    pub fn with_search_debounce(
        repository: Arc<dyn LoanRepository>,
        search_debounce: Duration,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(QueryState::default());
        Arc::new(Self {
            filters: FilterState::with_search_debounce(search_debounce),
            repository,
            state,
            latest_issued: AtomicU64::new(0),
            detail: DetailSelection::default(),
        })
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn detail_selection(&self) -> &DetailSelection {
        &self.detail
    }

    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    pub fn aggregates(&self) -> LoanAggregates {
        let filters = self.filters.snapshot();
        aggregate(&self.state.borrow().records, &filters)
    }

    /// Issues a list fetch for the current filters.
    ///
    /// The request is issued (sequence number taken, `loading` set) before
    /// this returns; the returned future settles it. Previous records and
    /// error stay visible until then. Failures are reported only through
    /// `QueryState::error`.
    pub fn fetch(self: &Arc<Self>) -> BoxFuture<'static, FetchOutcome> {
        let request = resolve(&self.filters.snapshot());
        let mut seq = 0;
        self.state.send_if_modified(|state| {
            // Issued under the watch lock so `loading` is set in sequence order.
            seq = self.latest_issued.fetch_add(1, Ordering::SeqCst) + 1;
            let was_loading = state.loading;
            state.loading = true;
            !was_loading
        });
        debug!(seq, path = %request.path, "query: fetch issued");

        let coordinator = Arc::clone(self);
        let repository = Arc::clone(&self.repository);
        Box::pin(async move {
            let result = repository.fetch_list(&request).await;
            coordinator.settle(seq, result)
        })
    }

    pub fn retry(self: &Arc<Self>) -> BoxFuture<'static, FetchOutcome> {
        self.fetch()
    }

    pub fn refresh(self: &Arc<Self>) -> BoxFuture<'static, FetchOutcome> {
        self.fetch()
    }

    fn settle(&self, seq: u64, result: Result<Vec<Record>, FetchFailure>) -> FetchOutcome {
        let result = result.map_err(|failure| {
            let error = classify(&failure);
            (failure, error)
        });
        let mut applied_failure = None;
        let applied = self.state.send_if_modified(|state| {
            // Compared under the watch lock so no newer settlement can land in between.
            if self.latest_issued.load(Ordering::SeqCst) != seq {
                return false;
            }
            *state = QueryState::settled(match result {
                Ok(records) => Ok(records),
                Err((failure, error)) => {
                    applied_failure = Some(failure);
                    Err(error)
                }
            });
            true
        });

        if !applied {
            debug!(seq, "query: discarded superseded result");
            return FetchOutcome::Superseded;
        }

        match applied_failure {
            Some(failure) => warn!(seq, %failure, "query: fetch failed"),
            None => {
                let state = self.state.borrow();
                self.detail.retain_within(&state.records);
                info!(seq, records = state.records.len(), "query: fetch applied");
            }
        }
        FetchOutcome::Applied
    }

    /// Issues the initial fetch and refetches on every filter change until
    /// the coordinator is dropped.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.filters.subscribe();
        tokio::spawn(self.fetch());

        let coordinator: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                changes.borrow_and_update();
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                tokio::spawn(coordinator.fetch());
            }
        })
    }

    pub async fn fetch_detail(&self, loan_id: &LoanId) -> Result<LoanDetail, ClassifiedError> {
        self.repository
            .fetch_detail(loan_id)
            .await
            .map_err(|failure| {
                warn!(loan_id = %loan_id, %failure, "query: detail fetch failed");
                classify(&failure)
            })
    }

    pub async fn fetch_payments(
        &self,
        loan_id: &LoanId,
    ) -> Result<PaymentSchedule, ClassifiedError> {
        self.repository
            .fetch_payments(loan_id)
            .await
            .map_err(|failure| {
                warn!(loan_id = %loan_id, %failure, "query: payments fetch failed");
                classify(&failure)
            })
    }

    pub async fn fetch_dashboard_summary(&self) -> Result<DashboardSummary, ClassifiedError> {
        self.repository
            .fetch_dashboard_summary()
            .await
            .map_err(|failure| {
                warn!(%failure, "query: dashboard summary fetch failed");
                classify(&failure)
            })
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
