//! Service resolution for route handlers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::ServiceInstance;

/// Resolves service instances by the key routes were registered against.
pub trait ServiceProvider: Send + Sync {
    fn get(&self, service_name: &str) -> Option<ServiceInstance>;
}

/// A simple in-memory [`ServiceProvider`].
#[derive(Default)]
pub struct ServiceCollection {
    services: HashMap<String, ServiceInstance>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service instance under the given key.
    pub fn register<T: Send + Sync + 'static>(
        &mut self,
        service_name: impl Into<String>,
        service: T,
    ) -> &mut Self {
        self.services.insert(service_name.into(), Arc::new(service));
        self
    }

    /// Registers an already shared instance.
    pub fn register_arc(
        &mut self,
        service_name: impl Into<String>,
        service: ServiceInstance,
    ) -> &mut Self {
        self.services.insert(service_name.into(), service);
        self
    }
}

impl ServiceProvider for ServiceCollection {
    fn get(&self, service_name: &str) -> Option<ServiceInstance> {
        self.services.get(service_name).cloned()
    }
}
