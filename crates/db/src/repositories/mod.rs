//! Repository layer: one zero-sized struct per table, async associated
//! functions taking a `&PgPool`.

pub mod reward_repo;
pub mod session_repo;
pub mod user_repo;

pub use reward_repo::RewardRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
