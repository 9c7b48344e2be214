pub mod reward;
pub mod session;
pub mod user;
