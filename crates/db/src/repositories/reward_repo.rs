//! Repository for the `user_rewards` ledger.

use bazaar_core::types::DbId;
use sqlx::PgPool;

use crate::models::reward::UserReward;

const COLUMNS: &str = "id, user_id, reason, points, created_at";

pub struct RewardRepo;

impl RewardRepo {
    /// Append a reward to a user's ledger.
    pub async fn grant(
        pool: &PgPool,
        user_id: DbId,
        reason: &str,
        points: i32,
    ) -> Result<UserReward, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_rewards (user_id, reason, points)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserReward>(&query)
            .bind(user_id)
            .bind(reason)
            .bind(points)
            .fetch_one(pool)
            .await
    }

    /// List a user's rewards, oldest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<UserReward>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM user_rewards WHERE user_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, UserReward>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
