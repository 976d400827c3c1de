use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use modkit::{DbModule, Module, ModuleCtx, OpenApiRegistry, RegistryBuilder, RestfulModule};
use modkit_db::DbHandle;
use tracing::{debug, info, warn};

use crate::api::rest::routes;
use crate::config::RegistrarConfig;
use crate::domain::repo::{CoursesRepository, StudentsRepository};
use crate::domain::service::{Service, ServiceConfig};
use crate::infra::storage::memory_repo::{InMemoryCoursesRepository, InMemoryStudentsRepository};
use crate::infra::storage::mongo_repo::{
    ensure_indexes, MongoCoursesRepository, MongoStudentsRepository,
};

pub const MODULE_NAME: &str = "registrar";

/// Courses, students and registrations over REST.
#[derive(Default)]
pub struct Registrar {
    service: ArcSwapOption<Service>,
}

impl Registrar {
    /// Domain service wired during `init`.
    pub fn service(&self) -> anyhow::Result<Arc<Service>> {
        self.service
            .load_full()
            .ok_or_else(|| anyhow::anyhow!("Service not initialized"))
    }
}

#[async_trait]
impl Module for Registrar {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        info!("Initializing registrar module");

        let cfg: RegistrarConfig = ctx.module_config();
        debug!(max_name_length = ?cfg.max_name_length, "Loaded registrar config");

        let (courses, students): (Arc<dyn CoursesRepository>, Arc<dyn StudentsRepository>) =
            match ctx.db() {
                Some(db) => (
                    Arc::new(MongoCoursesRepository::new(&db)),
                    Arc::new(MongoStudentsRepository::new(&db)),
                ),
                None => {
                    warn!("No database configured, data is kept in memory and lost on exit");
                    (
                        Arc::new(InMemoryCoursesRepository::new()),
                        Arc::new(InMemoryStudentsRepository::new()),
                    )
                }
            };

        let service = Service::new(
            courses,
            students,
            ServiceConfig {
                max_name_length: cfg.max_name_length,
            },
        );
        self.service.store(Some(Arc::new(service)));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait]
impl DbModule for Registrar {
    async fn migrate(&self, db: &DbHandle) -> anyhow::Result<()> {
        info!("Ensuring registrar indexes");
        ensure_indexes(db).await
    }
}

impl RestfulModule for Registrar {
    fn register_rest(
        &self,
        _ctx: &ModuleCtx,
        router: axum::Router,
        openapi: &dyn OpenApiRegistry,
    ) -> anyhow::Result<axum::Router> {
        let router = routes::register_routes(router, openapi, self.service()?)?;
        info!("Registrar REST routes registered");
        Ok(router)
    }
}

/// Registers the registrar as core, DB and REST module.
pub fn register(b: &mut RegistryBuilder) {
    let module = Arc::new(Registrar::default());
    b.register_core(MODULE_NAME, module.clone());
    b.register_db(MODULE_NAME, module.clone());
    b.register_rest(MODULE_NAME, module);
}
