use axum::Router;

/// An addon that contributes HTTP routes.
///
/// Each addon (web, base, ...) implements this trait to register its
/// endpoints. The binary entry point collects all addons and merges
/// their routes into a single Router.
pub trait Module: Send + Sync {
    /// Addon name, used for logging.
    fn name(&self) -> &str;

    /// Return the addon's routes, merged at the server root.
    fn routes(&self) -> Router;
}
