//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::clock::Clock;
use crate::config::EngineSettings;
use crate::loan_service::LoanService;
use crate::services::{EligibilityEvaluator, OverdueService, StatisticsService};
use crate::store::{LoanStore, PersonProvider, ResourceProvider};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub loan_service: Arc<LoanService>,
    pub eligibility: Arc<EligibilityEvaluator>,
    pub overdue_service: Arc<OverdueService>,
    pub statistics_service: Arc<StatisticsService>,
    /// Absent when running on the in-memory store
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        loan_service: Arc<LoanService>,
        eligibility: Arc<EligibilityEvaluator>,
        overdue_service: Arc<OverdueService>,
        statistics_service: Arc<StatisticsService>,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            loan_service,
            eligibility,
            overdue_service,
            statistics_service,
            db_pool,
        }
    }

    /// Wire every service onto one backing store
    pub fn from_store<S>(store: Arc<S>, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self
    where
        S: LoanStore + PersonProvider + ResourceProvider + 'static,
    {
        let loans: Arc<dyn LoanStore> = store.clone();
        let people: Arc<dyn PersonProvider> = store.clone();
        let resources: Arc<dyn ResourceProvider> = store;

        let eligibility = EligibilityEvaluator::new(
            loans.clone(),
            people.clone(),
            resources.clone(),
            clock.clone(),
            settings.severity,
        );
        let loan_service = LoanService::new(
            loans.clone(),
            resources.clone(),
            eligibility.clone(),
            clock.clone(),
            settings,
        );
        let overdue_service = OverdueService::new(
            loans.clone(),
            people.clone(),
            resources.clone(),
            clock.clone(),
            settings,
        );
        let statistics_service = StatisticsService::new(loans, people, resources, clock, settings);

        Self::new(
            Arc::new(loan_service),
            Arc::new(eligibility),
            Arc::new(overdue_service),
            Arc::new(statistics_service),
            None,
        )
    }

    pub fn with_db_pool(mut self, db_pool: PgPool) -> Self {
        self.db_pool = Some(db_pool);
        self
    }
}

impl FromRef<AppState> for Arc<LoanService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.loan_service.clone()
    }
}

impl FromRef<AppState> for Arc<EligibilityEvaluator> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.eligibility.clone()
    }
}

impl FromRef<AppState> for Arc<OverdueService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.overdue_service.clone()
    }
}

impl FromRef<AppState> for Arc<StatisticsService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.statistics_service.clone()
    }
}
