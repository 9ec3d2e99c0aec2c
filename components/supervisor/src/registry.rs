// Copyright (c) 2017 Chef Software Inc. and/or applicable contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Registered service descriptors, kept in registration order so initial
//! bring-up starts services the order they were added in.

use std::sync::atomic::{AtomicU64, Ordering};

use service::Service;

pub type WorkerId = usize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ServiceId(u64);

static NEXT_SERVICE_ID: AtomicU64 = AtomicU64::new(1);

impl ServiceId {
    fn next() -> Self {
        ServiceId(NEXT_SERVICE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A registered family of workers. `factory` is invoked once per worker,
/// in the freshly-forked child, with the worker's dense id; any
/// construction parameters a Python caller would have passed as
/// positional/keyword arguments are captured by the closure itself.
pub struct ServiceDescriptor {
    pub service_id: ServiceId,
    pub factory: Box<dyn Fn(WorkerId) -> Box<dyn Service> + Send + Sync>,
    pub workers: usize,
}

/// Services added to a `Supervisor`, kept in insertion order.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        ServiceRegistry { services: Vec::new() }
    }

    pub fn add<F>(&mut self, factory: F, workers: usize) -> ServiceId
    where
        F: Fn(WorkerId) -> Box<dyn Service> + Send + Sync + 'static,
    {
        let service_id = ServiceId::next();
        self.services.push(ServiceDescriptor {
            service_id: service_id,
            factory: Box::new(factory),
            workers: workers,
        });
        service_id
    }

    pub fn reconfigure(&mut self, service_id: ServiceId, workers: usize) -> bool {
        match self.services.iter_mut().find(|s| s.service_id == service_id) {
            Some(desc) => {
                desc.workers = workers;
                true
            }
            None => false,
        }
    }

    /// Iterate descriptors in the order they were registered.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service::Service;

    struct Noop;
    impl Service for Noop {}

    #[test]
    fn add_preserves_registration_order() {
        let mut registry = ServiceRegistry::new();
        let a = registry.add(|_id| Box::new(Noop) as Box<dyn Service>, 1);
        let b = registry.add(|_id| Box::new(Noop) as Box<dyn Service>, 1);
        let ids: Vec<ServiceId> = registry.iter().map(|d| d.service_id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn reconfigure_unknown_id_fails() {
        let mut registry = ServiceRegistry::new();
        let bogus = ServiceId::next();
        assert!(!registry.reconfigure(bogus, 3));
    }

    #[test]
    fn reconfigure_updates_worker_count() {
        let mut registry = ServiceRegistry::new();
        let id = registry.add(|_id| Box::new(Noop) as Box<dyn Service>, 1);
        assert!(registry.reconfigure(id, 4));
        assert_eq!(registry.iter().next().unwrap().workers, 4);
    }
}
