use super::*;
use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::domain::{Borrower, LoanStatus, LoanType, TypeFilter};
use tokio::{
    sync::{oneshot, Mutex},
    time::sleep,
};

use crate::{
    classify::ErrorKind,
    endpoint::{RequestDescriptor, CHECKS_PATH, LIST_PATH, SEARCH_PARAM, STATUS_PARAM},
    repository::TransportCode,
};

type ListReply = Result<Vec<Record>, FetchFailure>;

enum Reply {
    Ready(ListReply),
    Gate(oneshot::Receiver<ListReply>),
}

#[derive(Default)]
struct ScriptedRepository {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RequestDescriptor>>,
    detail_failure: Option<FetchFailure>,
}

impl ScriptedRepository {
    fn failing_details(failure: FetchFailure) -> Self {
        Self {
            detail_failure: Some(failure),
            ..Self::default()
        }
    }

    async fn reply(&self, reply: ListReply) {
        self.replies.lock().await.push_back(Reply::Ready(reply));
    }

    async fn gate(&self) -> oneshot::Sender<ListReply> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().await.push_back(Reply::Gate(rx));
        tx
    }

    async fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LoanRepository for ScriptedRepository {
    async fn fetch_list(&self, request: &RequestDescriptor) -> ListReply {
        self.requests.lock().await.push(request.clone());
        let reply = self.replies.lock().await.pop_front();
        match reply {
            Some(Reply::Ready(reply)) => reply,
            Some(Reply::Gate(rx)) => rx.await.unwrap_or_else(|_| {
                Err(FetchFailure::transport(
                    TransportCode::ConnectionAborted,
                    "gate dropped",
                ))
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_detail(&self, _loan_id: &LoanId) -> Result<LoanDetail, FetchFailure> {
        Err(self
            .detail_failure
            .clone()
            .unwrap_or_else(|| FetchFailure::status(404)))
    }

    async fn fetch_payments(&self, _loan_id: &LoanId) -> Result<PaymentSchedule, FetchFailure> {
        Err(FetchFailure::status(503))
    }

    async fn fetch_dashboard_summary(&self) -> Result<DashboardSummary, FetchFailure> {
        Ok(DashboardSummary {
            active_loans_count: 4,
            total_active_amount: Decimal::from(1000),
        })
    }
}

fn record(id: &str, loan_type: LoanType) -> Record {
    Record {
        id: LoanId::new(id),
        loan_type,
        amount: Decimal::from(100),
        status: LoanStatus::Active,
        start_date: None,
        borrower: Borrower {
            name: format!("borrower {id}"),
            phone: "0500000000".to_string(),
            email: None,
        },
        trustee: None,
    }
}

fn setup() -> (Arc<ScriptedRepository>, Arc<QueryCoordinator>) {
    let repository = Arc::new(ScriptedRepository::default());
    let coordinator = QueryCoordinator::new(repository.clone());
    (repository, coordinator)
}

#[tokio::test]
async fn starts_idle_and_loads_records() {
    let (repository, coordinator) = setup();
    assert_eq!(coordinator.state().phase(), QueryPhase::Idle);

    repository
        .reply(Ok(vec![record("a", LoanType::Checks)]))
        .await;
    let pending = coordinator.fetch();
    assert_eq!(coordinator.state().phase(), QueryPhase::Loading);

    assert_eq!(pending.await, FetchOutcome::Applied);
    let state = coordinator.state();
    assert_eq!(state.phase(), QueryPhase::Loaded);
    assert_eq!(state.records.len(), 1);
    assert!(state.has_fetched_once);
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn type_filter_scenario_resolves_checks_endpoint_and_counts() {
    let (repository, coordinator) = setup();
    coordinator.filters().set_type(TypeFilter::Checks);
    repository
        .reply(Ok(vec![
            record("a", LoanType::Checks),
            record("b", LoanType::Checks),
            record("c", LoanType::StandingOrder),
        ]))
        .await;

    coordinator.fetch().await;

    let requests = repository.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, CHECKS_PATH);
    assert_eq!(requests[0].param(STATUS_PARAM), Some("ACTIVE"));
    assert_eq!(requests[0].param(SEARCH_PARAM), None);

    let aggregates = coordinator.aggregates();
    assert_eq!(aggregates.count(LoanType::Checks), 2);
    assert_eq!(aggregates.count(LoanType::StandingOrder), 1);
    assert_eq!(aggregates.total_amount, Decimal::from(300));
    assert!(aggregates.has_active_filters);
}

#[tokio::test]
async fn not_found_failure_clears_records() {
    let (repository, coordinator) = setup();
    repository
        .reply(Ok(vec![record("a", LoanType::Checks)]))
        .await;
    coordinator.fetch().await;

    repository
        .reply(Err(FetchFailure::Status {
            status: 404,
            message: Some("no such endpoint".to_string()),
        }))
        .await;
    assert_eq!(coordinator.retry().await, FetchOutcome::Applied);

    let state = coordinator.state();
    assert_eq!(state.phase(), QueryPhase::Failed);
    assert!(state.records.is_empty());
    assert_eq!(
        state.error.as_ref().map(ClassifiedError::kind),
        Some(ErrorKind::NotFound)
    );
    assert!(!state.loading);
    assert!(state.has_fetched_once);
}

#[tokio::test]
async fn error_stays_visible_while_refetching_and_clears_on_success() {
    let (repository, coordinator) = setup();
    repository.reply(Err(FetchFailure::status(500))).await;
    coordinator.fetch().await;

    let gate = repository.gate().await;
    let mut pending = coordinator.refresh();
    assert!(futures::poll!(&mut pending).is_pending());

    let state = coordinator.state();
    assert!(state.loading);
    assert_eq!(
        state.error.as_ref().map(ClassifiedError::kind),
        Some(ErrorKind::ServerError)
    );

    gate.send(Ok(vec![record("a", LoanType::StandingOrder)]))
        .expect("gate open");
    assert_eq!(pending.await, FetchOutcome::Applied);

    let state = coordinator.state();
    assert_eq!(state.error, None);
    assert_eq!(state.records.len(), 1);
}

#[tokio::test]
async fn later_fetch_wins_when_earlier_settles_last() {
    let (repository, coordinator) = setup();
    let first_gate = repository.gate().await;
    let second_gate = repository.gate().await;

    let mut first = coordinator.fetch();
    assert!(futures::poll!(&mut first).is_pending());
    let mut second = coordinator.retry();
    assert!(futures::poll!(&mut second).is_pending());

    second_gate
        .send(Ok(vec![record("new", LoanType::Checks)]))
        .expect("gate open");
    assert_eq!(second.await, FetchOutcome::Applied);

    first_gate
        .send(Ok(vec![
            record("old-1", LoanType::Checks),
            record("old-2", LoanType::Checks),
        ]))
        .expect("gate open");
    assert_eq!(first.await, FetchOutcome::Superseded);

    let state = coordinator.state();
    assert_eq!(state.records, vec![record("new", LoanType::Checks)]);
    assert!(!state.loading);
}

#[tokio::test]
async fn stale_settlement_keeps_loading_while_newer_fetch_is_outstanding() {
    let (repository, coordinator) = setup();
    let first_gate = repository.gate().await;
    let second_gate = repository.gate().await;

    let mut first = coordinator.fetch();
    assert!(futures::poll!(&mut first).is_pending());
    let mut second = coordinator.fetch();
    assert!(futures::poll!(&mut second).is_pending());

    first_gate
        .send(Err(FetchFailure::status(500)))
        .expect("gate open");
    assert_eq!(first.await, FetchOutcome::Superseded);

    let state = coordinator.state();
    assert!(state.loading);
    assert_eq!(state.error, None);
    assert!(!state.has_fetched_once);

    second_gate
        .send(Ok(vec![record("a", LoanType::Checks)]))
        .expect("gate open");
    assert_eq!(second.await, FetchOutcome::Applied);
    assert_eq!(coordinator.state().phase(), QueryPhase::Loaded);
}

#[tokio::test(start_paused = true)]
async fn start_refetches_on_debounced_search_only() {
    let (repository, coordinator) = setup();
    let _watcher = coordinator.start();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(repository.requests().await.len(), 1);

    coordinator.filters().set_search_debounced("05");
    sleep(Duration::from_millis(100)).await;
    coordinator.filters().set_search_debounced("050");
    sleep(Duration::from_millis(100)).await;
    assert_eq!(repository.requests().await.len(), 1);

    sleep(Duration::from_millis(400)).await;
    let requests = repository.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].path, LIST_PATH);
    assert_eq!(requests[1].param(SEARCH_PARAM), Some("050"));
    assert!(requests
        .iter()
        .all(|request| request.param(SEARCH_PARAM) != Some("05")));

    coordinator.filters().clear_search();
    sleep(Duration::from_millis(10)).await;
    let requests = repository.requests().await;
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].param(SEARCH_PARAM), None);
}

#[tokio::test(start_paused = true)]
async fn configured_search_debounce_drives_refetch_timing() {
    let repository = Arc::new(ScriptedRepository::default());
    let coordinator =
        QueryCoordinator::with_search_debounce(repository.clone(), Duration::from_millis(120));
    let _watcher = coordinator.start();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(repository.requests().await.len(), 1);

    coordinator.filters().set_search_debounced("dana");
    sleep(Duration::from_millis(110)).await;
    assert_eq!(repository.requests().await.len(), 1);

    sleep(Duration::from_millis(20)).await;
    let requests = repository.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].param(SEARCH_PARAM), Some("dana"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fetches_never_leave_loading_set() {
    let (_repository, coordinator) = setup();

    let handles = (0..200)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.fetch().await })
        })
        .collect::<Vec<_>>();
    let mut applied = 0;
    for handle in handles {
        if handle.await.expect("fetch task") == FetchOutcome::Applied {
            applied += 1;
        }
    }

    let state = coordinator.state();
    assert!(applied >= 1);
    assert!(!state.loading);
    assert_eq!(state.phase(), QueryPhase::Loaded);
}

#[tokio::test]
async fn open_detail_row_closes_when_it_leaves_the_result_set() {
    let (repository, coordinator) = setup();
    repository
        .reply(Ok(vec![record("a", LoanType::Checks)]))
        .await;
    coordinator.fetch().await;
    assert!(coordinator.detail_selection().toggle(&LoanId::new("a")));

    repository
        .reply(Ok(vec![
            record("a", LoanType::Checks),
            record("b", LoanType::Checks),
        ]))
        .await;
    coordinator.fetch().await;
    assert!(coordinator.detail_selection().is_open(&LoanId::new("a")));

    repository
        .reply(Ok(vec![record("b", LoanType::Checks)]))
        .await;
    coordinator.fetch().await;
    assert_eq!(coordinator.detail_selection().open_id(), None);
}

#[tokio::test]
async fn single_reads_are_classified() {
    let repository = Arc::new(ScriptedRepository::failing_details(FetchFailure::Status {
        status: 422,
        message: Some("Loan is archived".to_string()),
    }));
    let coordinator = QueryCoordinator::new(repository);

    let err = coordinator
        .fetch_detail(&LoanId::new("a"))
        .await
        .expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::Domain);
    assert_eq!(err.message(), "Loan is archived");

    let err = coordinator
        .fetch_payments(&LoanId::new("a"))
        .await
        .expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::ServerError);

    let summary = coordinator
        .fetch_dashboard_summary()
        .await
        .expect("summary");
    assert_eq!(summary.active_loans_count, 4);
    assert_eq!(coordinator.state().phase(), QueryPhase::Idle);
}
