//! Account activity notices.
//!
//! Outbound delivery (email, push) is not wired up; notices are written to
//! the log where an operator or a log-shipping pipeline can pick them up.

use std::sync::Arc;

use bazaar_events::{Event, EventBus, HandlerResult, PasswordChanged, UserLoggedIn};

pub fn register(bus: &EventBus) {
    bus.subscribe(|event: Arc<UserLoggedIn>| async move { notify_login(&event) });
    bus.subscribe(|event: Arc<PasswordChanged>| async move { notify_password_changed(&event) });
}

fn notify_login(event: &UserLoggedIn) -> HandlerResult {
    tracing::info!(
        event = UserLoggedIn::NAME,
        user_id = event.user_id,
        ip = %event.remote_ip,
        city = %event.city,
        browser = %event.browser,
        "New sign-in notice"
    );
    Ok(())
}

fn notify_password_changed(event: &PasswordChanged) -> HandlerResult {
    if event.other_devices_revoked {
        tracing::info!(
            event = PasswordChanged::NAME,
            user_id = event.user_id,
            "Password changed notice: all devices signed out"
        );
    } else {
        tracing::warn!(
            event = PasswordChanged::NAME,
            user_id = event.user_id,
            "Password changed notice: other devices stay signed in until their sessions expire"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn login_and_password_notices_are_subscribed() {
        let bus = EventBus::new();
        register(&bus);
        assert_eq!(bus.subscriber_count::<UserLoggedIn>(), 1);
        assert_eq!(bus.subscriber_count::<PasswordChanged>(), 1);

        let spawned = bus.publish(PasswordChanged {
            user_id: 1,
            other_devices_revoked: false,
        });
        assert_eq!(spawned, 1);
        assert!(bus.shutdown(Duration::from_secs(1)).await);
    }
}
