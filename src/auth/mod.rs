// Authentication module
// Credential storage and the single-flight token refresh coordinator

mod types;
mod store;
mod refresh;
mod coordinator;

pub use coordinator::{RequestCoordinator, SessionExpired};
pub use store::CredentialStore;
pub use types::{LoginRequest, LoginResponse, Session, UserInfo};
