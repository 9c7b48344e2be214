//! Background tasks spawned at server startup.
//!
//! Each task runs in a loop until a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! is triggered during graceful shutdown.

pub mod session_cleanup;
