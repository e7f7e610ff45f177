pub mod accounts;
pub mod books;
pub mod library;
pub mod notifications;
pub mod posts;

use folio_kernel::ModuleRegistry;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry) -> anyhow::Result<()> {
    registry.register(accounts::create_module())?;
    registry.register(books::create_module())?;
    registry.register(library::create_module())?;
    registry.register(posts::create_module())?;
    registry.register(notifications::create_module())?;
    Ok(())
}
