use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct InvestmentPlan {
    pub id: String,
    pub name: String,
    pub min_amount_in_cents: i64,
    pub max_amount_in_cents: i64,
    pub daily_return_percent: f64,
    pub duration_days: i32,
    /// Lowest VIP tier allowed to buy into this plan.
    pub min_vip_level: i16,
}
