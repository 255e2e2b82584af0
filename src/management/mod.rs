mod auth;
mod store;

pub use auth::TokenManager;
pub use store::EventRange;
pub use store::SnapshotStore;
pub use store::StoreError;
pub use store::StoreOptions;
