//! Case data loader: fetches the record for the selected case.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::api::{ApiClient, CaseResponse};
use crate::fetch::{FetchState, Guarded};

pub type CaseState = FetchState<CaseResponse>;

#[derive(Clone)]
pub struct CaseDataLoader {
    api: ApiClient,
    state: Arc<Guarded<CaseState>>,
}

impl CaseDataLoader {
    pub fn new(api: ApiClient) -> Self {
        Self { api, state: Arc::new(Guarded::new(CaseState::idle())) }
    }

    pub fn subscribe(&self) -> watch::Receiver<CaseState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> CaseState {
        self.state.snapshot()
    }

    /// Load the record for `case_id`, superseding any earlier request.
    ///
    /// An absent or empty id resets to idle without touching the network.
    /// Returns the published state once this request settles (or was
    /// superseded, in which case the newer request's state is returned).
    pub async fn load(&self, case_id: Option<&str>) -> CaseState {
        let Some(case_id) = case_id.filter(|id| !id.is_empty()) else {
            self.state.begin(|s| *s = CaseState::idle());
            return self.state();
        };

        let ticket = self.state.begin(FetchState::start);
        let result = self.api.get_case(case_id).await;

        let applied = self.state.settle(ticket, |s| match result {
            Ok(response) => s.succeed(response),
            Err(e) => s.fail(e.to_string()),
        });
        if !applied {
            debug!(case_id, "discarding superseded case response");
        }

        self.state()
    }
}
