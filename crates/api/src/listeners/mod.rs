//! Cross-domain reactions to authentication events.
//!
//! Each submodule subscribes its handlers to the [`EventBus`] during startup
//! wiring. Handlers run detached from the request that published the event;
//! their failures are logged by the bus and never reach the publisher.

pub mod notifications;
pub mod rewards;

use bazaar_db::DbPool;
use bazaar_events::EventBus;

/// Subscribe every listener. Call once, before the server accepts traffic.
pub fn register(bus: &EventBus, pool: &DbPool) {
    rewards::register(bus, pool.clone());
    notifications::register(bus);
}
