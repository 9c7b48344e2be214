//! Gamification reward ledger.

use bazaar_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_rewards` ledger.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserReward {
    pub id: DbId,
    pub user_id: DbId,
    pub reason: String,
    pub points: i32,
    pub created_at: Timestamp,
}
