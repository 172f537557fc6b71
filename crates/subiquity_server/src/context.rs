//! The hierarchical `Context` breadcrumb (spec.md §3 "Context").
//!
//! Every non-trivial server operation opens a child context. Entry/exit are
//! reported to registered listeners (the event bus, see `eventbus.rs`) and
//! logged at DEBUG (spec.md §10.1).

use std::future::Future;
use std::sync::Arc;

use log::debug;
use subiquity_core::events::Status;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Context {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parent_id: Option<String>,
    /// UI-suppressed operations (spec.md §3: "a 'hidden' flag for
    /// UI-suppressed operations").
    pub hidden: bool,
}

pub trait ContextListener: Send + Sync {
    fn on_enter(&self, ctx: &Context);
    fn on_exit(&self, ctx: &Context, status: Status);
}

/// Owns the set of context listeners and mints new contexts.
#[derive(Clone, Default)]
pub struct ContextManager {
    listeners: Vec<Arc<dyn ContextListener>>,
}

impl ContextManager {
    pub fn with_listener(mut self, listener: Arc<dyn ContextListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn child(
        &self,
        parent: Option<&Context>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Context {
        Context {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            parent_id: parent.map(|p| p.id.clone()),
            hidden: false,
        }
    }

    pub fn hidden_child(
        &self,
        parent: Option<&Context>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Context {
        let mut ctx = self.child(parent, name, description);
        ctx.hidden = true;
        ctx
    }

    /// Reports entry to every listener. Exposed directly (not just through
    /// `run`) for event-driven callers like the curtin context tracker that
    /// don't own a future to wrap.
    pub fn enter(&self, ctx: &Context) {
        debug!("context enter: {} ({})", ctx.name, ctx.description);
        for listener in &self.listeners {
            listener.on_enter(ctx);
        }
    }

    pub fn exit(&self, ctx: &Context, status: Status) {
        debug!("context exit: {} -> {:?}", ctx.name, status);
        for listener in &self.listeners {
            listener.on_exit(ctx, status);
        }
    }

    /// Runs `f` inside a freshly entered child context, exiting it with a
    /// status derived from the result once `f` completes.
    pub async fn run<F, Fut, T, E>(
        &self,
        parent: Option<&Context>,
        name: impl Into<String>,
        description: impl Into<String>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ctx = self.child(parent, name, description);
        self.enter(&ctx);
        let result = f(ctx.clone()).await;
        let status = match &result {
            Ok(_) => Status::SUCCESS,
            Err(_) => Status::FAILURE,
        };
        self.exit(&ctx, status);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        entered: Mutex<Vec<String>>,
        exited: Mutex<Vec<(String, Status)>>,
    }

    impl ContextListener for Recorder {
        fn on_enter(&self, ctx: &Context) {
            self.entered.lock().unwrap().push(ctx.name.clone());
        }
        fn on_exit(&self, ctx: &Context, status: Status) {
            self.exited.lock().unwrap().push((ctx.name.clone(), status));
        }
    }

    #[tokio::test]
    async fn run_reports_enter_and_exit_with_derived_status() {
        let recorder = Arc::new(Recorder::default());
        let manager = ContextManager::default().with_listener(recorder.clone());

        let result: Result<(), &str> = manager
            .run(None, "filesystem", "probing disks", |_ctx| async { Ok(()) })
            .await;
        assert!(result.is_ok());

        let failing: Result<(), &str> = manager
            .run(None, "network", "apply", |_ctx| async { Err("boom") })
            .await;
        assert!(failing.is_err());

        assert_eq!(*recorder.entered.lock().unwrap(), vec!["filesystem", "network"]);
        let exited = recorder.exited.lock().unwrap();
        assert_eq!(exited[0], ("filesystem".to_string(), Status::SUCCESS));
        assert_eq!(exited[1], ("network".to_string(), Status::FAILURE));
    }
}
