//! Collaborators the builtins call out to
//!
//! Each concern is a trait shared as `Arc<dyn ...>`. [`Services`] bundles the
//! handles an engine was configured with; all of them are optional except the
//! configuration, which defaults to an empty [`StaticConfig`].

pub mod caller;
pub mod config;
pub mod geocoding;
pub mod localization;
pub mod mail;
pub mod memory_store;
pub mod process;
pub mod query;
pub mod security;
pub mod store;

use std::fmt;
use std::sync::Arc;

pub use caller::{ActionCaller, RecordingActionCaller};
pub use config::{ConfigProvider, StaticConfig};
pub use geocoding::{GeoCoordinates, Geocoder, StaticGeocoder};
pub use localization::{Localizer, MemoryLocalizer};
pub use mail::{MailMessage, MailService, MemoryMail};
pub use memory_store::{Fixture, MemoryStore};
pub use process::{ProcessOutput, ProcessRunner, ShellProcessRunner};
pub use query::{GraphQuery, StaticGraphQuery};
pub use security::{MemorySecurity, Permission, SecurityService};
pub use store::{Direction, EntityStore, PropertyInfo, Query, Relationship};

use crate::error::{ExpressionError, ExpressionResult};

/// Service handles available to builtins
#[derive(Clone)]
pub struct Services {
    store: Option<Arc<dyn EntityStore>>,
    security: Option<Arc<dyn SecurityService>>,
    config: Arc<dyn ConfigProvider>,
    mail: Option<Arc<dyn MailService>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    graph: Option<Arc<dyn GraphQuery>>,
    processes: Option<Arc<dyn ProcessRunner>>,
    localizer: Option<Arc<dyn Localizer>>,
    caller: Option<Arc<dyn ActionCaller>>,
}

impl Services {
    /// No services besides an empty configuration
    pub fn new() -> Self {
        Self {
            store: None,
            security: None,
            config: Arc::new(StaticConfig::new()),
            mail: None,
            geocoder: None,
            graph: None,
            processes: None,
            localizer: None,
            caller: None,
        }
    }

    /// In-memory store, permissions and localizations
    pub fn in_memory() -> Self {
        Self::builder()
            .store(Arc::new(MemoryStore::new()))
            .security(MemorySecurity::arc())
            .localizer(Arc::new(MemoryLocalizer::new()))
            .build()
    }

    pub fn builder() -> ServicesBuilder {
        ServicesBuilder {
            services: Self::new(),
        }
    }

    pub fn store(&self) -> Option<&Arc<dyn EntityStore>> {
        self.store.as_ref()
    }

    /// Entity store, or a `Service` error when none is configured
    pub fn require_store(&self) -> ExpressionResult<&dyn EntityStore> {
        self.store
            .as_deref()
            .ok_or_else(|| ExpressionError::service_unavailable("entity store"))
    }

    pub fn require_security(&self) -> ExpressionResult<&dyn SecurityService> {
        self.security
            .as_deref()
            .ok_or_else(|| ExpressionError::service_unavailable("security"))
    }

    pub fn config(&self) -> &dyn ConfigProvider {
        self.config.as_ref()
    }

    pub fn mail(&self) -> Option<&dyn MailService> {
        self.mail.as_deref()
    }

    pub fn geocoder(&self) -> Option<&dyn Geocoder> {
        self.geocoder.as_deref()
    }

    pub fn graph(&self) -> Option<&dyn GraphQuery> {
        self.graph.as_deref()
    }

    pub fn processes(&self) -> Option<&dyn ProcessRunner> {
        self.processes.as_deref()
    }

    pub fn localizer(&self) -> Option<&dyn Localizer> {
        self.localizer.as_deref()
    }

    pub fn caller(&self) -> Option<&dyn ActionCaller> {
        self.caller.as_deref()
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("store", &self.store.is_some())
            .field("security", &self.security.is_some())
            .field("mail", &self.mail.is_some())
            .field("geocoder", &self.geocoder.is_some())
            .field("graph", &self.graph.is_some())
            .field("processes", &self.processes.is_some())
            .field("localizer", &self.localizer.is_some())
            .field("caller", &self.caller.is_some())
            .finish()
    }
}

/// Builder for [`Services`]
#[derive(Debug, Clone)]
pub struct ServicesBuilder {
    services: Services,
}

impl ServicesBuilder {
    pub fn store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.services.store = Some(store);
        self
    }

    pub fn security(mut self, security: Arc<dyn SecurityService>) -> Self {
        self.services.security = Some(security);
        self
    }

    pub fn config(mut self, config: Arc<dyn ConfigProvider>) -> Self {
        self.services.config = config;
        self
    }

    pub fn mail(mut self, mail: Arc<dyn MailService>) -> Self {
        self.services.mail = Some(mail);
        self
    }

    pub fn geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.services.geocoder = Some(geocoder);
        self
    }

    pub fn graph(mut self, graph: Arc<dyn GraphQuery>) -> Self {
        self.services.graph = Some(graph);
        self
    }

    pub fn processes(mut self, processes: Arc<dyn ProcessRunner>) -> Self {
        self.services.processes = Some(processes);
        self
    }

    pub fn localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.services.localizer = Some(localizer);
        self
    }

    pub fn caller(mut self, caller: Arc<dyn ActionCaller>) -> Self {
        self.services.caller = Some(caller);
        self
    }

    pub fn build(self) -> Services {
        self.services
    }
}
