pub mod manager;
pub mod models;
pub mod repository;
pub mod tenant_scope;

pub use manager::{DatabaseError, DatabaseManager};
pub use tenant_scope::{TenantBinder, TenantScope};
