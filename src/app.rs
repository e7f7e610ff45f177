//! Application bootstrap: database, migrations, module lifecycle and serving.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use folio_db::Database;
use folio_kernel::{settings::Settings, AppState, InitCtx, ModuleRegistry};

use crate::modules::{self, accounts::TokenAuthenticator};

/// Every Folio module, in registration order
pub fn registry() -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry)?;
    Ok(registry)
}

/// Open the configured database
pub async fn connect(settings: &Settings) -> anyhow::Result<Database> {
    Database::connect(&settings.database.url, settings.database.max_connections)
        .await
        .context("failed to open database")
}

/// Apply pending migrations of every module
pub async fn migrate(db: &Database, registry: &ModuleRegistry) -> anyhow::Result<usize> {
    let applied = db
        .migrate(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations up to date");
    Ok(applied)
}

/// A migrated, initialized application ready to serve
pub struct App {
    pub registry: ModuleRegistry,
    pub state: AppState,
}

impl App {
    pub async fn bootstrap(settings: Settings, db: Database) -> anyhow::Result<Self> {
        let registry = registry()?;
        migrate(&db, &registry).await?;
        registry
            .init_modules(&InitCtx {
                settings: &settings,
                db: &db,
            })
            .await?;

        let authenticator = Arc::new(TokenAuthenticator::new(db.clone()));
        let state = AppState::new(settings, db, authenticator);
        Ok(Self { registry, state })
    }

    pub fn router(&self) -> Router {
        folio_http::build_router(&self.registry, self.state.clone())
    }

    fn ctx(&self) -> InitCtx<'_> {
        InitCtx {
            settings: &self.state.settings,
            db: &self.state.db,
        }
    }
}

/// Run the HTTP server until shutdown, then stop modules in reverse order
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let db = connect(&settings).await?;
    let app = App::bootstrap(settings, db).await?;

    app.registry.start_modules(&app.ctx()).await?;
    let served = folio_http::start_server(app.router(), &app.state.settings).await;

    app.registry.stop_modules().await?;
    app.state.db.close().await;
    tracing::info!("folio-app shut down");
    served
}
