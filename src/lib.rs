/// Defaults, on-disk configuration, and logging setup.
pub mod config;

/// CLI interface and role dispatch.
pub mod cli;

/// Wire messages exchanged between nodes and the server.
pub mod message;

/// The TCP server that accepts node registrations.
pub mod server;

/// The node client that registers with a server.
pub mod node;

/// Daemon lifecycle control for the server process.
pub mod daemon;

/// User record storage.
pub mod store;

/// Macro for retrying an operation a bounded number of times with capped backoff
#[macro_export]
macro_rules! retry_operation {
    ($attempts:expr, $operation:expr, $log_prefix:expr) => {{
        let attempts = std::cmp::max($attempts, 1);
        let mut result = None;

        for attempt in 1..=attempts {
            match $operation {
                Ok(res) => {
                    result = Some(Ok(res));
                    break;
                }
                Err(e) => {
                    if attempt < attempts {
                        // Backoff doubles per attempt: 1s, 2s, 4s... capped at 30s
                        let secs = std::cmp::min(1u64 << std::cmp::min(attempt - 1, 5), 30);
                        log::warn!(
                            "{} failed (attempt {}/{}): {}, retrying in {}s...",
                            $log_prefix,
                            attempt,
                            attempts,
                            e,
                            secs
                        );

                        let delay = std::time::Duration::from_secs(secs);
                        tokio::time::sleep(delay).await;
                    } else {
                        log::error!("{} failed after {} attempts: {}", $log_prefix, attempts, e);
                    }
                    result = Some(Err(e));
                }
            }
        }

        result.unwrap()
    }};
}
