use std::sync::Arc;

use crate::application::ports::JobRepository;
use crate::application::services::{AdmissionService, BalanceLedger};

#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionService>,
    pub ledger: Arc<BalanceLedger>,
    pub job_repository: Arc<dyn JobRepository>,
}
