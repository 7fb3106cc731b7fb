//! Client-side query state for the loans list: filter selection, debounced
//! search, last-write-wins fetching, error classification and aggregates.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod details;
pub mod endpoint;
pub mod filters;
pub mod repository;

pub use aggregate::{aggregate, LoanAggregates, NO_FILTERS_SUMMARY};
pub use classify::{classify, ClassifiedError, ErrorKind};
pub use config::{load_settings, ClientSettings};
pub use coordinator::{FetchOutcome, QueryCoordinator, QueryPhase, QueryState};
pub use details::DetailSelection;
pub use endpoint::{resolve, RequestDescriptor};
pub use filters::{FilterSelection, FilterState, DEFAULT_SEARCH_DEBOUNCE};
pub use repository::{FetchFailure, HttpLoanRepository, LoanRepository, TransportCode};
