//! Gamification: grant a welcome bonus to new accounts.

use std::sync::Arc;

use bazaar_db::repositories::RewardRepo;
use bazaar_db::DbPool;
use bazaar_events::{EventBus, HandlerResult, UserRegistered};

/// Points granted for creating an account.
pub const SIGNUP_BONUS_POINTS: i32 = 100;

/// Ledger reason recorded with the signup bonus.
pub const SIGNUP_BONUS_REASON: &str = "signup_bonus";

pub fn register(bus: &EventBus, pool: DbPool) {
    bus.subscribe(move |event: Arc<UserRegistered>| {
        let pool = pool.clone();
        async move { grant_signup_bonus(&pool, &event).await }
    });
}

async fn grant_signup_bonus(pool: &DbPool, event: &UserRegistered) -> HandlerResult {
    let reward = RewardRepo::grant(
        pool,
        event.user_id,
        SIGNUP_BONUS_REASON,
        SIGNUP_BONUS_POINTS,
    )
    .await?;
    tracing::info!(
        user_id = event.user_id,
        reward_id = reward.id,
        points = reward.points,
        "Signup bonus granted"
    );
    Ok(())
}
