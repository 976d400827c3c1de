//! Module registry: collects what each module crate contributes and drives
//! the ordered phases over it.

use axum::Router;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use thiserror::Error;

use crate::context::ModuleCtx;
use crate::contracts::{DbModule, Module, RestHostModule, RestfulModule, StatefulModule};

/// One module with the capabilities it registered.
pub struct ModuleEntry {
    pub name: &'static str,
    pub core: Arc<dyn Module>,
    pub rest: Option<Arc<dyn RestfulModule>>,
    pub rest_host: Option<Arc<dyn RestHostModule>>,
    pub db: Option<Arc<dyn DbModule>>,
    pub stateful: Option<Arc<dyn StatefulModule>>,
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("name", &self.name)
            .field("rest", &self.rest.is_some())
            .field("rest_host", &self.rest_host.is_some())
            .field("db", &self.db.is_some())
            .field("stateful", &self.stateful.is_some())
            .finish()
    }
}

/// Entry point a module crate exposes to put itself into a [`RegistryBuilder`].
#[derive(Clone, Copy)]
pub struct Registrator(pub fn(&mut RegistryBuilder));

/// Phase a module failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Db,
    RestPrepare,
    RestRegister,
    RestFinalize,
    Start,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Init => "init",
            Phase::Db => "db setup",
            Phase::RestPrepare => "REST prepare",
            Phase::RestRegister => "REST registration",
            Phase::RestFinalize => "REST finalize",
            Phase::Start => "start",
        })
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{phase} failed for module '{module}'")]
    Phase {
        phase: Phase,
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("modules with REST routes were registered but no module hosts them")]
    RestRequiresHost,
    #[error("invalid registry configuration: {}", errors.join("; "))]
    InvalidConfiguration { errors: Vec<String> },
}

impl RegistryError {
    fn phase(phase: Phase, module: &'static str, source: anyhow::Error) -> Self {
        Self::Phase {
            phase,
            module,
            source,
        }
    }
}

/// Capabilities gathered under one name before the core is known to exist.
#[derive(Default)]
struct Slot {
    core: Option<Arc<dyn Module>>,
    rest: Option<Arc<dyn RestfulModule>>,
    rest_host: Option<Arc<dyn RestHostModule>>,
    db: Option<Arc<dyn DbModule>>,
    stateful: Option<Arc<dyn StatefulModule>>,
}

/// Builder that registrators feed. Modules keep the order in which their
/// names were first seen.
#[derive(Default)]
pub struct RegistryBuilder {
    slots: Vec<(&'static str, Slot)>,
    errors: Vec<String>,
}

impl RegistryBuilder {
    fn slot(&mut self, name: &'static str) -> &mut Slot {
        let pos = match self.slots.iter().position(|(n, _)| *n == name) {
            Some(pos) => pos,
            None => {
                self.slots.push((name, Slot::default()));
                self.slots.len() - 1
            }
        };
        &mut self.slots[pos].1
    }

    pub fn register_core(&mut self, name: &'static str, m: Arc<dyn Module>) {
        let slot = self.slot(name);
        if slot.core.replace(m).is_some() {
            self.errors.push(format!("module '{name}' is registered twice"));
        }
    }

    pub fn register_rest(&mut self, name: &'static str, m: Arc<dyn RestfulModule>) {
        self.slot(name).rest = Some(m);
    }

    pub fn register_rest_host(&mut self, name: &'static str, m: Arc<dyn RestHostModule>) {
        if let Some((existing, _)) = self.slots.iter().find(|(_, s)| s.rest_host.is_some()) {
            self.errors.push(format!(
                "'{name}' cannot host REST routes, '{existing}' already does"
            ));
            return;
        }
        self.slot(name).rest_host = Some(m);
    }

    pub fn register_db(&mut self, name: &'static str, m: Arc<dyn DbModule>) {
        self.slot(name).db = Some(m);
    }

    pub fn register_stateful(&mut self, name: &'static str, m: Arc<dyn StatefulModule>) {
        self.slot(name).stateful = Some(m);
    }

    /// Every capability must belong to a module that registered its core.
    pub fn build(mut self) -> Result<ModuleRegistry, RegistryError> {
        let mut modules = Vec::with_capacity(self.slots.len());
        for (name, slot) in self.slots {
            let Some(core) = slot.core else {
                self.errors
                    .push(format!("capabilities registered for unknown module '{name}'"));
                continue;
            };
            modules.push(ModuleEntry {
                name,
                core,
                rest: slot.rest,
                rest_host: slot.rest_host,
                db: slot.db,
                stateful: slot.stateful,
            });
        }

        if !self.errors.is_empty() {
            return Err(RegistryError::InvalidConfiguration {
                errors: self.errors,
            });
        }

        tracing::info!(
            modules = ?modules.iter().map(|e| e.name).collect::<Vec<_>>(),
            "Module registry built"
        );
        Ok(ModuleRegistry { modules })
    }
}

/// Registered modules in registration order.
pub struct ModuleRegistry {
    modules: Vec<ModuleEntry>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.modules.iter().map(|m| m.name))
            .finish()
    }
}

impl ModuleRegistry {
    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    pub fn from_registrators(registrators: &[Registrator]) -> Result<Self, RegistryError> {
        let mut b = RegistryBuilder::default();
        for r in registrators {
            (r.0)(&mut b);
        }
        b.build()
    }

    pub fn get_module(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.core.clone())
    }

    pub async fn run_init_phase(&self, base_ctx: &ModuleCtx) -> Result<(), RegistryError> {
        for e in &self.modules {
            let ctx = base_ctx.clone().for_module(e.name);
            e.core
                .init(&ctx)
                .await
                .map_err(|err| RegistryError::phase(Phase::Init, e.name, err))?;
            tracing::debug!(module = e.name, "Module initialized");
        }
        Ok(())
    }

    pub async fn run_db_phase(&self, db: &modkit_db::DbHandle) -> Result<(), RegistryError> {
        for e in &self.modules {
            let Some(dbm) = &e.db else { continue };
            dbm.migrate(db)
                .await
                .map_err(|err| RegistryError::phase(Phase::Db, e.name, err))?;
            tracing::debug!(module = e.name, "Database setup complete");
        }
        Ok(())
    }

    /// Host prepare, then every provider, then host finalize. Returns the
    /// finalized router, which the host also keeps for serving.
    pub fn run_rest_phase(
        &self,
        base_ctx: &ModuleCtx,
        router: Router,
    ) -> Result<Router, RegistryError> {
        let Some((host_name, host)) = self
            .modules
            .iter()
            .find_map(|e| e.rest_host.as_ref().map(|h| (e.name, h)))
        else {
            if self.modules.iter().any(|e| e.rest.is_some()) {
                return Err(RegistryError::RestRequiresHost);
            }
            return Ok(router);
        };

        let host_ctx = base_ctx.clone().for_module(host_name);
        let mut router = host
            .rest_prepare(&host_ctx, router)
            .map_err(|err| RegistryError::phase(Phase::RestPrepare, host_name, err))?;

        let registry = host.as_registry();
        for e in &self.modules {
            let Some(rest) = &e.rest else { continue };
            let ctx = base_ctx.clone().for_module(e.name);
            router = rest
                .register_rest(&ctx, router, registry)
                .map_err(|err| RegistryError::phase(Phase::RestRegister, e.name, err))?;
        }

        host.rest_finalize(&host_ctx, router)
            .map_err(|err| RegistryError::phase(Phase::RestFinalize, host_name, err))
    }

    pub async fn run_start_phase(&self, cancel: CancellationToken) -> Result<(), RegistryError> {
        for e in &self.modules {
            let Some(s) = &e.stateful else { continue };
            s.start(cancel.clone())
                .await
                .map_err(|err| RegistryError::phase(Phase::Start, e.name, err))?;
        }
        Ok(())
    }

    /// Stop in reverse order; failures are logged and do not abort the phase.
    pub async fn run_stop_phase(&self, cancel: CancellationToken) {
        for e in self.modules.iter().rev() {
            let Some(s) = &e.stateful else { continue };
            if let Err(err) = s.stop(cancel.clone()).await {
                tracing::warn!(module = e.name, error = %err, "Failed to stop module");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::OpenApiRegistry;
    use crate::context::ModuleCtxBuilder;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use parking_lot::Mutex;
    use tower::ServiceExt;

    struct Noop;

    #[async_trait::async_trait]
    impl Module for Noop {
        async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl Module for Failing {
        async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[derive(Default)]
    struct Host {
        docs: Mutex<usize>,
    }

    impl OpenApiRegistry for Host {
        fn register_document(&self, _doc: utoipa::openapi::OpenApi) {
            *self.docs.lock() += 1;
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    impl RestHostModule for Host {
        fn rest_prepare(&self, _ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router> {
            Ok(router.route("/api/health", axum::routing::get(|| async { "ok" })))
        }
        fn rest_finalize(&self, _ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router> {
            Ok(router)
        }
        fn as_registry(&self) -> &dyn OpenApiRegistry {
            self
        }
    }

    struct Provider;

    impl RestfulModule for Provider {
        fn register_rest(
            &self,
            _ctx: &ModuleCtx,
            router: Router,
            openapi: &dyn OpenApiRegistry,
        ) -> anyhow::Result<Router> {
            openapi.register_document(utoipa::openapi::OpenApi::default());
            Ok(router.route("/api/things", axum::routing::get(|| async { "[]" })))
        }
    }

    fn ctx() -> ModuleCtx {
        ModuleCtxBuilder::new(CancellationToken::new()).build()
    }

    fn names(reg: &ModuleRegistry) -> Vec<&'static str> {
        reg.modules().iter().map(|m| m.name).collect()
    }

    #[test]
    fn modules_keep_registration_order() {
        let mut b = RegistryBuilder::default();
        for n in ["ingress", "courses", "audit"] {
            b.register_core(n, Arc::new(Noop));
        }
        assert_eq!(names(&b.build().unwrap()), ["ingress", "courses", "audit"]);
    }

    #[test]
    fn capability_may_precede_its_core() {
        let mut b = RegistryBuilder::default();
        b.register_rest("courses", Arc::new(Provider));
        b.register_core("courses", Arc::new(Noop));
        let reg = b.build().unwrap();
        assert!(reg.modules()[0].rest.is_some());
    }

    #[test]
    fn capability_without_core_is_rejected() {
        let mut b = RegistryBuilder::default();
        b.register_rest("ghost", Arc::new(Provider));
        match b.build().unwrap_err() {
            RegistryError::InvalidConfiguration { errors } => {
                assert!(errors[0].contains("ghost"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_core_and_second_host_are_reported_together() {
        let mut b = RegistryBuilder::default();
        b.register_core("a", Arc::new(Noop));
        b.register_core("a", Arc::new(Noop));
        b.register_core("b", Arc::new(Noop));
        b.register_rest_host("a", Arc::new(Host::default()));
        b.register_rest_host("b", Arc::new(Host::default()));

        match b.build().unwrap_err() {
            RegistryError::InvalidConfiguration { errors } => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].contains("registered twice"));
                assert!(errors[1].contains("already does"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rest_providers_need_a_host() {
        let mut b = RegistryBuilder::default();
        b.register_core("courses", Arc::new(Noop));
        b.register_rest("courses", Arc::new(Provider));
        let reg = b.build().unwrap();

        let err = reg.run_rest_phase(&ctx(), Router::new()).unwrap_err();
        assert!(matches!(err, RegistryError::RestRequiresHost));
    }

    #[tokio::test]
    async fn rest_phase_composes_host_and_providers() {
        let host = Arc::new(Host::default());
        let mut b = RegistryBuilder::default();
        b.register_core("ingress", Arc::new(Noop));
        b.register_rest_host("ingress", host.clone());
        b.register_core("courses", Arc::new(Noop));
        b.register_rest("courses", Arc::new(Provider));
        let reg = b.build().unwrap();

        let router = reg.run_rest_phase(&ctx(), Router::new()).unwrap();

        assert_eq!(*host.docs.lock(), 1);
        for path in ["/api/health", "/api/things"] {
            let resp = router
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn init_failure_names_module_and_phase() {
        let mut b = RegistryBuilder::default();
        b.register_core("ok", Arc::new(Noop));
        b.register_core("broken", Arc::new(Failing));
        let reg = b.build().unwrap();

        let err = reg.run_init_phase(&ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "init failed for module 'broken'");
        assert!(matches!(
            err,
            RegistryError::Phase {
                phase: Phase::Init,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_registry_runs_every_phase() {
        let reg = ModuleRegistry::from_registrators(&[]).unwrap();
        assert!(reg.modules().is_empty());

        reg.run_init_phase(&ctx()).await.unwrap();
        let router = reg.run_rest_phase(&ctx(), Router::new()).unwrap();
        let resp = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let cancel = CancellationToken::new();
        reg.run_start_phase(cancel.clone()).await.unwrap();
        reg.run_stop_phase(cancel).await;
        assert!(reg.get_module("zzz").is_none());
    }
}
