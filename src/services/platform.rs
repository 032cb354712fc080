use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::app_settings::{AppSettings, AppSettingsUpdate};
use crate::models::plans::InvestmentPlan;
use crate::repositories::app_settings::AppSettingsRepository;
use crate::repositories::plans::PlanRepository;

/// Plan catalog and the admin-editable settings singleton.
pub enum PlatformRequest {
    ListPlans {
        response: oneshot::Sender<Result<Vec<InvestmentPlan>, ServiceError>>,
    },
    GetSettings {
        response: oneshot::Sender<Result<AppSettings, ServiceError>>,
    },
    UpdateSettings {
        update: AppSettingsUpdate,
        response: oneshot::Sender<Result<AppSettings, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct PlatformRequestHandler {
    plans: PlanRepository,
    settings: AppSettingsRepository,
}

impl PlatformRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        PlatformRequestHandler {
            plans: PlanRepository::new(sql_conn.clone()),
            settings: AppSettingsRepository::new(sql_conn),
        }
    }
}

#[async_trait]
impl RequestHandler<PlatformRequest> for PlatformRequestHandler {
    async fn handle_request(&self, request: PlatformRequest) {
        match request {
            PlatformRequest::ListPlans { response } => {
                let result = self
                    .plans
                    .list_plans()
                    .await
                    .map_err(|e| ServiceError::Database(e.to_string()));
                let _ = response.send(result);
            }
            PlatformRequest::GetSettings { response } => {
                let result = self
                    .settings
                    .get()
                    .await
                    .map_err(|e| ServiceError::Database(e.to_string()));
                let _ = response.send(result);
            }
            PlatformRequest::UpdateSettings { update, response } => {
                let result = self
                    .settings
                    .update(&update)
                    .await
                    .map_err(|e| ServiceError::Database(e.to_string()));
                let _ = response.send(result);
            }
        }
    }
}

pub struct PlatformService;

impl PlatformService {
    pub fn new() -> Self {
        PlatformService {}
    }
}

#[async_trait]
impl Service<PlatformRequest, PlatformRequestHandler> for PlatformService {}
