//! Background Expiry Sweeper
//!
//! Lazy expiry only removes a key when something touches it; a key that
//! expires and is never read again would stay in memory. The sweeper is a
//! Tokio task that periodically locks the server and runs
//! [`Server::cron`], which actively expires keys on every database and
//! advances any incremental rehash.
//!
//! ## Adaptive Frequency
//!
//! If a large share of the keyspace expired in one pass the interval is
//! halved (down to `min_interval`); if nothing expired it is doubled (up to
//! `max_interval`).

use crate::server::{lock, SharedServer};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval before the first pass (default: 100ms)
    pub base_interval: Duration,

    /// Minimum interval between passes (default: 10ms)
    pub min_interval: Duration,

    /// Maximum interval between passes (default: 1s)
    pub max_interval: Duration,

    /// Expired fraction above which sweeping speeds up
    pub speedup_threshold: f64,

    /// Expired fraction below which sweeping slows down
    pub slowdown_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
            slowdown_threshold: 0.01,
        }
    }
}

/// Handle to the running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current Tokio runtime.
    pub fn start(server: SharedServer, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(server, config, shutdown_rx));
        info!("background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper. Also called on drop.
    pub fn stop(&self) {
        if !*self.shutdown_tx.borrow() {
            let _ = self.shutdown_tx.send(true);
            info!("background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    server: SharedServer,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let report = lock(&server).cron();
        let expired = report.expired;
        let keys_before = report.keys + expired;

        current_interval = next_interval(&config, current_interval, expired, keys_before);

        if expired > 0 {
            debug!(
                expired,
                keys_remaining = report.keys,
                volatile = report.volatile,
                interval_ms = current_interval.as_millis() as u64,
                "expired keys cleaned up"
            );
        } else {
            trace!(
                keys = report.keys,
                rehashing = report.rehashing,
                "cron pass"
            );
        }
    }
}

/// Interval for the next pass given how much of the keyspace just expired.
fn next_interval(
    config: &ExpiryConfig,
    current: Duration,
    expired: usize,
    keys_before: usize,
) -> Duration {
    if keys_before == 0 {
        return current;
    }
    let rate = expired as f64 / keys_before as f64;
    if rate > config.speedup_threshold {
        (current / 2).max(config.min_interval)
    } else if rate < config.slowdown_threshold && expired == 0 {
        (current * 2).min(config.max_interval)
    } else {
        current
    }
}

/// Starts the sweeper with the default configuration.
pub fn start_expiry_sweeper(server: SharedServer) -> ExpirySweeper {
    ExpirySweeper::start(server, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{ClientState, Server};
    use crate::storage::db::now_ms;
    use crate::storage::object::Object;
    use bytes::Bytes;

    fn cmd(line: &str) -> Vec<Bytes> {
        line.split_whitespace()
            .map(|s| Bytes::copy_from_slice(s.as_bytes()))
            .collect()
    }

    fn seeded(volatile: usize, persistent: usize, ttl_ms: u64) -> SharedServer {
        let mut server = Server::new(2);
        let mut client = ClientState::default();
        for i in 0..volatile {
            server.execute(&mut client, &cmd(&format!("SET key{i} value")));
            server.execute(&mut client, &cmd(&format!("PEXPIRE key{i} {ttl_ms}")));
        }
        for i in 0..persistent {
            server.execute(&mut client, &cmd(&format!("SET keep{i} value")));
        }
        server.into_shared()
    }

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let server = seeded(10, 1, 50);
        assert_eq!(lock(&server).key_count(), 11);

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let _sweeper = ExpirySweeper::start(server.clone(), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        // only the persistent key is left, without anyone reading the others
        assert_eq!(lock(&server).key_count(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let server = seeded(0, 0, 0);
        let config = ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        };

        {
            let _sweeper = ExpirySweeper::start(server.clone(), config);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        {
            let mut guard = lock(&server);
            let db = guard.db_mut(0).unwrap();
            db.set(Object::from("key"), Object::from("value"));
            db.set_expire(&Object::from("key"), now_ms() + 10);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        // the stopped sweeper left the key in place; a lookup still hides it
        let mut guard = lock(&server);
        assert_eq!(guard.key_count(), 1);
        assert!(guard.db_mut(0).unwrap().lookup(&Object::from("key")).is_none());
    }

    #[tokio::test]
    async fn test_sweeper_adaptive_interval() {
        let server = seeded(1000, 0, 20);
        let config = ExpiryConfig {
            base_interval: Duration::from_millis(50),
            min_interval: Duration::from_millis(5),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.1,
            slowdown_threshold: 0.01,
        };

        let _sweeper = ExpirySweeper::start(server.clone(), config);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(lock(&server).key_count(), 0);
    }

    #[test]
    fn test_next_interval() {
        let config = ExpiryConfig::default();
        let base = config.base_interval;

        assert_eq!(next_interval(&config, base, 0, 0), base);
        assert_eq!(next_interval(&config, base, 50, 100), base / 2);
        assert_eq!(next_interval(&config, base, 0, 100), base * 2);
        assert_eq!(next_interval(&config, base, 10, 100), base);
        assert_eq!(
            next_interval(&config, config.min_interval, 90, 100),
            config.min_interval
        );
        assert_eq!(
            next_interval(&config, config.max_interval, 0, 100),
            config.max_interval
        );
    }
}
