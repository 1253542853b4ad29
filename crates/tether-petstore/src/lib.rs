// ABOUTME: Petstore messages, tonic stubs and the generated trigger and activity adapters.
// ABOUTME: Each adapter file lives in its own module next to the tonic-build output.

use tether_runtime::ServiceRegistry;

pub mod petstore {
    include!(concat!(env!("OUT_DIR"), "/petstore.rs"));

    pub mod pet_store_service_trigger {
        include!(concat!(env!("OUT_DIR"), "/petstore.PetStoreService.server.tether.rs"));
    }

    pub mod pet_store_service_activity {
        include!(concat!(env!("OUT_DIR"), "/petstore.PetStoreService.client.tether.rs"));
    }

    pub mod user_service_trigger {
        include!(concat!(env!("OUT_DIR"), "/petstore.UserService.server.tether.rs"));
    }

    pub mod user_service_activity {
        include!(concat!(env!("OUT_DIR"), "/petstore.UserService.client.tether.rs"));
    }
}

/// Registry holding every petstore adapter.
pub fn registry() -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    petstore::pet_store_service_trigger::register(&mut registry);
    petstore::pet_store_service_activity::register(&mut registry);
    petstore::user_service_trigger::register(&mut registry);
    petstore::user_service_activity::register(&mut registry);
    registry
}
