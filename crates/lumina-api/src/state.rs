//! Shared application state.

use std::sync::Arc;

use lumina_core::Config;
use lumina_db::MediaStore;
use lumina_processing::DerivativeCoordinator;
use lumina_queue::JobPublisher;

use crate::services::library::LibraryService;

pub struct AppState {
    pub library: LibraryService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn MediaStore>,
        coordinator: Arc<DerivativeCoordinator>,
        derivatives_queue: Arc<dyn JobPublisher>,
        cleanup_queue: Arc<dyn JobPublisher>,
    ) -> Self {
        Self {
            library: LibraryService::new(
                config,
                store,
                coordinator,
                derivatives_queue,
                cleanup_queue,
            ),
        }
    }
}
