use sqlx::PgPool;

use crate::models::plans::InvestmentPlan;

const PLAN_COLUMNS: &str = "id, name, min_amount_in_cents, max_amount_in_cents, \
     daily_return_percent, duration_days, min_vip_level";

#[derive(Clone)]
pub struct PlanRepository {
    conn: PgPool,
}

impl PlanRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn list_plans(&self) -> Result<Vec<InvestmentPlan>, anyhow::Error> {
        let plans = sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM investment_plans ORDER BY min_vip_level, min_amount_in_cents"
        ))
        .fetch_all(&self.conn)
        .await?;

        Ok(plans)
    }
}
