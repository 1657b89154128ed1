//! Connection guard.

use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

use super::{Address, Healthcheck, Pool};
use crate::backend::Backend;
use crate::net::{Command, Value};
use crate::Error;

/// Connection guard.
///
/// Owns one connection for the duration of a request. On drop, the
/// connection goes back into the pool, or is closed if it broke or
/// was interrupted in the middle of a command.
pub struct Guard {
    server: Option<Box<dyn Backend>>,
    pool: Pool,
    permit: Option<OwnedSemaphorePermit>,
    broken: bool,
    in_flight: bool,
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("addr", self.pool.addr())
            .field("broken", &self.broken)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl Guard {
    /// Create new connection guard.
    pub(super) fn new(pool: Pool, server: Box<dyn Backend>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            server: Some(server),
            pool,
            permit: Some(permit),
            broken: false,
            in_flight: false,
        }
    }

    /// Execute one command.
    pub async fn execute(&mut self, command: &Command) -> Result<Value, Error> {
        let server = self.server.as_mut().ok_or(Error::Offline)?;

        self.in_flight = true;
        let result = server.execute(command).await;
        self.in_flight = false;

        if matches!(result, Err(ref err) if err.is_transport()) {
            self.broken = true;
        }

        result
    }

    /// Execute several commands in one round trip.
    pub async fn execute_batch(&mut self, commands: &[Command]) -> Result<Vec<Value>, Error> {
        let server = self.server.as_mut().ok_or(Error::Offline)?;

        self.in_flight = true;
        let result = server.execute_batch(commands).await;
        self.in_flight = false;

        match result {
            Ok(replies) if replies.len() != commands.len() => {
                self.broken = true;
                Err(Error::Protocol(format!(
                    "expected {} replies, got {}",
                    commands.len(),
                    replies.len()
                )))
            }
            Err(err) => {
                if err.is_transport() {
                    self.broken = true;
                }
                Err(err)
            }
            ok => ok,
        }
    }

    /// Don't return this connection to the pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Connection will be closed on drop.
    pub fn broken(&self) -> bool {
        self.broken || self.in_flight
    }

    /// Node address.
    pub fn addr(&self) -> &Address {
        self.pool.addr()
    }

    /// Return the connection to the pool, or close it.
    fn cleanup(&mut self) {
        let Some(mut server) = self.server.take() else {
            return;
        };
        let permit = self.permit.take();
        let pool = self.pool.clone();

        if self.broken() {
            if self.in_flight {
                debug!("command interrupted, closing connection [{}]", pool.addr());
            }
            pool.discard(server);
            drop(permit);
            return;
        }

        if !pool.config().test_on_return {
            pool.checkin(server);
            drop(permit);
            return;
        }

        // Health check needs the runtime; without one, play it safe.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let healthy = Healthcheck::new(server.as_mut(), &pool)
                        .healthcheck()
                        .await
                        .is_ok();
                    if healthy {
                        pool.checkin(server);
                    } else {
                        pool.discard(server);
                    }
                    drop(permit);
                });
            }
            Err(_) => {
                pool.discard(server);
                drop(permit);
            }
        }
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        self.cleanup();
    }
}
