use std::sync::Arc;

use voxdub::DubbingService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DubbingService>,
}

impl AppState {
    pub fn new(service: Arc<DubbingService>) -> Self {
        Self { service }
    }
}
