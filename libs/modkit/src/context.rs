use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Source of per-module config sections, keyed by module name.
pub trait ConfigProvider: Send + Sync {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

/// What a module sees of the running server during its phases.
#[derive(Clone)]
pub struct ModuleCtx {
    db: Option<Arc<modkit_db::DbHandle>>,
    config: Option<Arc<dyn ConfigProvider>>,
    cancel: CancellationToken,
    module: Option<Arc<str>>,
}

pub struct ModuleCtxBuilder(ModuleCtx);

impl ModuleCtxBuilder {
    pub fn new(cancel: CancellationToken) -> Self {
        Self(ModuleCtx {
            db: None,
            config: None,
            cancel,
            module: None,
        })
    }

    pub fn with_db(mut self, db: Arc<modkit_db::DbHandle>) -> Self {
        self.0.db = Some(db);
        self
    }

    pub fn with_config_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.0.config = Some(provider);
        self
    }

    pub fn for_module(self, name: &str) -> Self {
        Self(self.0.for_module(name))
    }

    pub fn build(self) -> ModuleCtx {
        self.0
    }
}

impl ModuleCtx {
    pub(crate) fn for_module(mut self, name: &str) -> Self {
        self.module = Some(Arc::from(name));
        self
    }

    /// `None` when the server runs without MongoDB (`--mock`).
    pub fn db(&self) -> Option<Arc<modkit_db::DbHandle>> {
        self.db.clone()
    }

    /// Fires when the server begins shutting down.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn current_module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// The module's `modules.<name>` section, or `T::default()` when it is
    /// absent. A malformed section is logged and also falls back to default.
    pub fn module_config<T: DeserializeOwned + Default>(&self) -> T {
        let (Some(name), Some(provider)) = (&self.module, &self.config) else {
            return T::default();
        };
        let Some(section) = provider.get_module_config(name) else {
            return T::default();
        };
        T::deserialize(section).unwrap_or_else(|e| {
            tracing::warn!(module = %name, error = %e, "invalid module config, using defaults");
            T::default()
        })
    }
}
