use std::sync::Arc;

use crate::config::Config;
use crate::fanout::{EmailChannel, Fanout, PushChannel};
use crate::lifecycle::TaskEngine;
use crate::membership::Membership;
use crate::store::Store;

/// Shared handles, built once in `main` and cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub fanout: Fanout,
    pub membership: Membership,
    pub tasks: TaskEngine,
    pub mailer: Arc<dyn EmailChannel>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        push: Arc<dyn PushChannel>,
        mailer: Arc<dyn EmailChannel>,
        config: Config,
    ) -> Self {
        let fanout = Fanout::new(store.clone(), push);
        let membership = Membership::new(store.clone(), fanout.clone());
        let tasks = TaskEngine::new(store.clone(), fanout.clone(), membership.clone());
        Self {
            store,
            fanout,
            membership,
            tasks,
            mailer,
            config,
        }
    }
}
