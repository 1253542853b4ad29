// ABOUTME: Explicit registry of generated server and client adapters.
// ABOUTME: Generated register() functions populate it at composition time; triggers and activities look adapters up by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tonic::service::RoutesBuilder;
use tonic::transport::Channel;
use tracing::{debug, warn};

use crate::client::InvocationRequest;
use crate::error::AdapterError;
use crate::handler::TriggerHandler;

/// Identity of a generated adapter: the definition file it came from and
/// the service it bridges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceInfo {
    /// Base name of the definition file, without extension.
    pub proto_name: &'static str,
    /// Service name as written in the definition file.
    pub service_name: &'static str,
}

impl ServiceInfo {
    /// Create service info.
    pub const fn new(proto_name: &'static str, service_name: &'static str) -> Self {
        Self {
            proto_name,
            service_name,
        }
    }

    fn key(&self) -> String {
        format!("{}.{}", self.proto_name, self.service_name)
    }
}

/// A generated server adapter.
pub trait ServerService: Send + Sync {
    /// Identity of the adapter.
    fn service_info(&self) -> &ServiceInfo;

    /// Mount the adapter on a router, dispatching served calls to `handler`.
    fn add_to(&self, routes: &mut RoutesBuilder, handler: Arc<dyn TriggerHandler>);
}

/// A generated client adapter.
#[async_trait]
pub trait ClientService: Send + Sync {
    /// Identity of the adapter.
    fn service_info(&self) -> &ServiceInfo;

    /// Invoke `request.method_name` on the service reachable over `channel`.
    async fn invoke(
        &self,
        channel: Channel,
        request: InvocationRequest,
    ) -> Result<Value, AdapterError>;
}

/// Registry of generated adapters.
///
/// Populate it by calling each generated module's `register` function when
/// composing the application.
#[derive(Default)]
pub struct ServiceRegistry {
    servers: BTreeMap<String, Arc<dyn ServerService>>,
    clients: BTreeMap<String, Arc<dyn ClientService>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server adapter, replacing any adapter with the same identity.
    pub fn register_server(&mut self, service: Arc<dyn ServerService>) {
        let key = service.service_info().key();
        debug!(service = %key, "registering server adapter");
        if self.servers.insert(key.clone(), service).is_some() {
            warn!(service = %key, "server adapter registered twice; keeping the latest");
        }
    }

    /// Register a client adapter, replacing any adapter with the same identity.
    pub fn register_client(&mut self, service: Arc<dyn ClientService>) {
        let key = service.service_info().key();
        debug!(service = %key, "registering client adapter");
        if self.clients.insert(key.clone(), service).is_some() {
            warn!(service = %key, "client adapter registered twice; keeping the latest");
        }
    }

    /// Look up a server adapter.
    pub fn server(&self, proto_name: &str, service_name: &str) -> Option<Arc<dyn ServerService>> {
        self.servers
            .get(&format!("{proto_name}.{service_name}"))
            .cloned()
    }

    /// Look up a client adapter.
    pub fn client(&self, proto_name: &str, service_name: &str) -> Option<Arc<dyn ClientService>> {
        self.clients
            .get(&format!("{proto_name}.{service_name}"))
            .cloned()
    }

    /// Identities of all registered server adapters, in name order.
    pub fn server_infos(&self) -> Vec<ServiceInfo> {
        self.servers.values().map(|s| *s.service_info()).collect()
    }

    /// Identities of all registered client adapters, in name order.
    pub fn client_infos(&self) -> Vec<ServiceInfo> {
        self.clients.values().map(|c| *c.service_info()).collect()
    }

    /// Mount every server adapter on one router.
    pub fn routes(&self, handler: Arc<dyn TriggerHandler>) -> RoutesBuilder {
        let mut routes = RoutesBuilder::default();
        for service in self.servers.values() {
            service.add_to(&mut routes, Arc::clone(&handler));
        }
        routes
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("servers", &self.servers.keys().collect::<Vec<_>>())
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}
