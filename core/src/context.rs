//! Application-level initialisation state.
//!
//! Front ends hold one [`AppContext`] and reach the service through it. Boot
//! runs open, migrate and seed in order; a failure is kept until the user
//! retries or resets.

use std::mem;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::service::BuaService;
use crate::storage::ImageStore;

pub enum InitState<S> {
    Uninitialised,
    Loading,
    Ready(Box<BuaService<S>>),
    Failed(Arc<Error>),
}

pub struct AppContext<S: ImageStore + Clone> {
    store: S,
    limits: Limits,
    state: InitState<S>,
}

impl<S: ImageStore + Clone> AppContext<S> {
    pub fn new(store: S, limits: Limits) -> Self {
        Self {
            store,
            limits,
            state: InitState::Uninitialised,
        }
    }

    pub fn state(&self) -> &InitState<S> {
        &self.state
    }

    pub fn is_initialised(&self) -> bool {
        matches!(self.state, InitState::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, InitState::Loading)
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.state {
            InitState::Failed(e) => Some(&**e),
            _ => None,
        }
    }

    pub fn service(&self) -> Result<&BuaService<S>> {
        match &self.state {
            InitState::Ready(service) => Ok(&**service),
            _ => Err(Error::NotInitialised),
        }
    }

    /// Boot if not done yet. A previous failure is returned as is; use
    /// [`Self::reinitialise`] to try again.
    pub async fn initialise(&mut self) -> Result<(), Arc<Error>> {
        match &self.state {
            InitState::Ready(_) => return Ok(()),
            InitState::Failed(e) => return Err(Arc::clone(e)),
            InitState::Uninitialised | InitState::Loading => {}
        }

        self.state = InitState::Loading;
        match BuaService::open(self.store.clone(), self.limits).await {
            Ok(service) => {
                info!("initialised");
                self.state = InitState::Ready(Box::new(service));
                Ok(())
            }
            Err(e) => {
                error!(error = %e, fatal = e.is_fatal(), "initialisation failed");
                let e = Arc::new(e);
                self.state = InitState::Failed(Arc::clone(&e));
                Err(e)
            }
        }
    }

    /// Release the current connection, if any, and return to the uninitialised state.
    fn shut_down(&mut self) {
        if let InitState::Ready(service) = mem::replace(&mut self.state, InitState::Uninitialised) {
            if let Err(e) = service.into_database().close() {
                warn!(error = %e, "closing database failed");
            }
        }
    }

    /// Close and boot again from whatever the store holds.
    pub async fn reinitialise(&mut self) -> Result<(), Arc<Error>> {
        self.shut_down();
        self.initialise().await
    }

    /// Discard the stored image and boot a fresh database.
    pub async fn reset(&mut self) -> Result<(), Arc<Error>> {
        self.shut_down();
        if let Err(e) = self.store.clear().await {
            let e = Arc::new(Error::from(e));
            self.state = InitState::Failed(Arc::clone(&e));
            return Err(e);
        }
        warn!("stored image cleared");
        self.initialise().await
    }
}
