//! Bazaar in-process event bus.
//!
//! Lets one domain announce a fact ("a user registered") and any number of
//! other domains react to it without a compile-time dependency between
//! them.
//!
//! - [`EventBus`]: typed publish/subscribe registry; every matching handler
//!   runs as its own detached task.
//! - [`Event`]: marker trait giving each event type a stable name.
//! - [`events`]: the concrete domain events.

pub mod bus;
pub mod events;

pub use bus::{Event, EventBus, HandlerResult};
pub use events::{PasswordChanged, UserLoggedIn, UserRegistered};
