mod page;
mod state;

pub use page::DiffPage;
pub use state::{App, Focus};

use crate::config::ViewerConfig;
use crate::session::SessionStore;
use std::sync::Arc;

/// Shared services handed to the page when it is built
pub struct AppContext {
    pub config: ViewerConfig,
    pub session: Arc<dyn SessionStore>,
}
