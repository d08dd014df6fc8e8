//! Custom repositories.

use crate::manager::EntityManager;
use crate::store::DocumentStore;

/// A collaborator built on top of an [`EntityManager`].
///
/// Repositories group the queries of one document type behind named
/// methods. They borrow the manager, so whatever they read is tracked by
/// the manager's unit of work.
///
/// ```rust
/// use elasticdata_core::{
///     Document, DocumentStore, EntityManager, EntityRef, InMemoryStore, ManagerConfig,
///     Repository, RepositoryResult, Schema,
/// };
/// use serde_json::json;
///
/// struct User;
///
/// impl Schema for User {
///     const TYPE_NAME: &'static str = "user";
/// }
///
/// struct Users<'m, S: DocumentStore> {
///     manager: &'m mut EntityManager<S>,
/// }
///
/// impl<'m, S: DocumentStore> Repository<'m, S> for Users<'m, S> {
///     fn from_manager(manager: &'m mut EntityManager<S>) -> Self {
///         Self { manager }
///     }
/// }
///
/// impl<S: DocumentStore> Users<'_, S> {
///     fn by_login(&mut self, login: &str) -> RepositoryResult<EntityRef<Document<User>>> {
///         self.manager
///             .query_one(json!({"query": {"term": {"login": login}}}))
///     }
/// }
///
/// let mut manager = EntityManager::new(InMemoryStore::new(), ManagerConfig::default());
/// manager.persist(&EntityRef::new(
///     Document::<User>::from_value(json!({"login": "ann"})).unwrap(),
/// ));
/// manager.flush().unwrap();
///
/// let ann = manager.repository::<Users<_>>().by_login("ann").unwrap();
/// assert_eq!(ann.read().get("login"), Some(&json!("ann")));
/// ```
pub trait Repository<'m, S: DocumentStore>: Sized {
    /// Binds the repository to a manager.
    fn from_manager(manager: &'m mut EntityManager<S>) -> Self;
}
