// Handler state for each REST surface. Kept separate so the Controller
// and Key-Value Store routers can be mounted standalone or merged into
// one `Router`.

use foreman_core::port::{Controller, KvStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct ControllerState {
    pub controller: Arc<dyn Controller>,
}

#[derive(Clone)]
pub struct KvState {
    pub kv: Arc<dyn KvStore>,
}
