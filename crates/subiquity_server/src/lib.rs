pub mod context;
pub mod core;
pub mod error;
pub mod errorreport;
pub mod eventbus;
pub mod install;
pub mod netclient;
pub mod router;

pub use context::{Context, ContextListener, ContextManager};
pub use core::{Server, ServerOptions};
pub use error::{InstallError, ServerError};
pub use errorreport::{ErrorReport, ErrorReporter};
pub use eventbus::{EventBus, SubscriptionRegistry};
pub use install::InstallTask;
pub use router::{AppState, build_router};
