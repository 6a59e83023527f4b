use std::sync::Arc;

use faugus_core::Settings;
use faugus_core::registry::RunningGameRegistry;
use faugus_process::{ProcFs, ProcessTreeController, SystemSignaller};

pub type Controller = ProcessTreeController<ProcFs, SystemSignaller>;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: RunningGameRegistry,
    pub controller: Arc<Controller>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let registry = RunningGameRegistry::new(settings.paths.running_games_file.clone());
        Self {
            settings: Arc::new(settings),
            registry,
            controller: Arc::new(ProcessTreeController::new(ProcFs::default(), SystemSignaller)),
        }
    }
}
