//! Connection pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error};

use super::{Address, Config, Guard, Healthcheck, Inner, PoolConfig, State};
use crate::backend::{Backend, Connect};
use crate::Error;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);
fn next_pool_id() -> u64 {
    ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Connection pool for one node.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<InnerSync>,
}

pub(crate) struct InnerSync {
    pub(super) addr: Address,
    pub(super) config: Config,
    pub(super) inner: Mutex<Inner>,
    pub(super) permits: Arc<Semaphore>,
    pub(super) connector: Arc<dyn Connect>,
    pub(super) id: u64,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("addr", &self.inner.addr)
            .field("id", &self.inner.id)
            .finish()
    }
}

impl Pool {
    /// Create new connection pool. The pool is offline until [`Pool::launch`].
    pub fn new(config: &PoolConfig, connector: Arc<dyn Connect>) -> Self {
        Self {
            inner: Arc::new(InnerSync {
                addr: config.address.clone(),
                config: config.config,
                inner: Mutex::new(Inner::new(config.config)),
                permits: Arc::new(Semaphore::new(config.config.max_total)),
                connector,
                id: next_pool_id(),
            }),
        }
    }

    /// Bring the pool online.
    pub fn launch(&self) {
        self.lock().online = true;
    }

    /// Open one connection and keep it idle, making sure the node
    /// is reachable.
    pub async fn warm_up(&self) -> Result<(), Error> {
        let guard = self.get().await?;
        drop(guard);
        Ok(())
    }

    /// Get a connection from the pool, waiting up to the checkout timeout
    /// for one to become available.
    pub async fn get(&self) -> Result<Guard, Error> {
        if !self.lock().online {
            return Err(Error::Offline);
        }

        let permit = match timeout(
            self.config().checkout_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(Error::Offline),
            Err(_) => {
                self.lock().stats.checkout_timeouts += 1;
                return Err(Error::PoolExhausted);
            }
        };

        loop {
            let idle = {
                let mut guard = self.lock();
                if !guard.online {
                    return Err(Error::Offline);
                }
                guard.take()
            };

            let conn = match idle {
                Some(mut conn) => {
                    if self.config().test_on_borrow {
                        let mut healthcheck = Healthcheck::new(conn.as_mut(), self);
                        if healthcheck.healthcheck().await.is_err() {
                            self.lock().stats.errors += 1;
                            // Try another connection.
                            continue;
                        }
                    }
                    conn
                }
                None => self.connect().await?,
            };

            self.lock().stats.checkouts += 1;
            return Ok(Guard::new(self.clone(), conn, permit));
        }
    }

    /// Open a new connection to the node.
    async fn connect(&self) -> Result<Box<dyn Backend>, Error> {
        let connect = self.inner.connector.connect(self.addr(), self.config());

        match timeout(self.config().connect_timeout, connect).await {
            Ok(Ok(conn)) => {
                debug!("new connection [{}]", self.addr());
                self.lock().stats.connects += 1;
                Ok(conn)
            }
            Ok(Err(err)) => {
                error!("connection error: {} [{}]", err, self.addr());
                self.lock().stats.connect_errors += 1;
                Err(err)
            }
            Err(_) => {
                error!("connection timeout [{}]", self.addr());
                self.lock().stats.connect_errors += 1;
                Err(Error::ConnectTimeout)
            }
        }
    }

    /// Check a healthy connection back into the pool.
    pub(super) fn checkin(&self, conn: Box<dyn Backend>) {
        self.lock().put(conn);
    }

    /// Close a broken connection.
    pub(super) fn discard(&self, conn: Box<dyn Backend>) {
        error!("pool received broken connection, closing [{}]", self.addr());
        self.lock().stats.errors += 1;
        drop(conn);
    }

    /// Take the pool offline, closing idle connections and failing
    /// everyone waiting for a connection.
    pub fn shutdown(&self) {
        let mut guard = self.lock();
        guard.online = false;
        guard.dump_idle();
        self.inner.permits.close();
    }

    /// Pool is accepting checkouts.
    pub fn online(&self) -> bool {
        self.lock().online
    }

    /// Connections currently held by callers.
    pub fn checked_out(&self) -> usize {
        self.config()
            .max_total
            .saturating_sub(self.inner.permits.available_permits())
    }

    /// Pool state.
    pub fn state(&self) -> State {
        State::get(self)
    }

    /// Pool exclusive lock.
    #[inline]
    pub(super) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.inner.lock()
    }

    /// Node address.
    #[inline]
    pub fn addr(&self) -> &Address {
        &self.inner.addr
    }

    /// Pool configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Pool unique identifier.
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }
}
