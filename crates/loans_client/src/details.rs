use shared::domain::{LoanId, Record};
use tokio::sync::watch;

/// The single expanded detail row of a loan list.
pub struct DetailSelection {
    open: watch::Sender<Option<LoanId>>,
}

impl Default for DetailSelection {
    fn default() -> Self {
        let (open, _) = watch::channel(None);
        Self { open }
    }
}

impl DetailSelection {
    /// Opens `loan_id`, or closes it when it is already open. Returns whether
    /// the row is open afterwards.
    pub fn toggle(&self, loan_id: &LoanId) -> bool {
        let mut now_open = false;
        self.open.send_modify(|open| {
            if open.as_ref() == Some(loan_id) {
                *open = None;
            } else {
                *open = Some(loan_id.clone());
                now_open = true;
            }
        });
        now_open
    }

    pub fn is_open(&self, loan_id: &LoanId) -> bool {
        self.open.borrow().as_ref() == Some(loan_id)
    }

    pub fn open_id(&self) -> Option<LoanId> {
        self.open.borrow().clone()
    }

    pub fn close(&self) {
        self.open.send_if_modified(|open| open.take().is_some());
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LoanId>> {
        self.open.subscribe()
    }

    /// Closes the open row if it is not part of `records`.
    pub(crate) fn retain_within(&self, records: &[Record]) {
        self.open.send_if_modified(|open| {
            let stale = open
                .as_ref()
                .is_some_and(|id| !records.iter().any(|record| &record.id == id));
            if stale {
                *open = None;
            }
            stale
        });
    }
}
