//! Healthcheck a connection.

use std::time::Duration;

use tokio::time::timeout;
use tracing::error;

use super::Pool;
use crate::backend::Backend;
use crate::Error;

/// Perform a healthcheck on a connection.
pub struct Healthcheck<'a> {
    conn: &'a mut dyn Backend,
    pool: &'a Pool,
    healthcheck_timeout: Duration,
}

impl<'a> Healthcheck<'a> {
    /// Healthcheck using the pool's timeout.
    pub fn new(conn: &'a mut dyn Backend, pool: &'a Pool) -> Self {
        Self {
            conn,
            pool,
            healthcheck_timeout: pool.config().healthcheck_timeout(),
        }
    }

    /// Ping the node.
    pub async fn healthcheck(&mut self) -> Result<(), Error> {
        self.pool.lock().stats.healthchecks += 1;

        match timeout(self.healthcheck_timeout, self.conn.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                error!("health check error: {} [{}]", err, self.pool.addr());
                Err(Error::HealthcheckError)
            }
            Err(_) => {
                error!("health check timed out [{}]", self.pool.addr());
                Err(Error::HealthcheckError)
            }
        }
    }
}
