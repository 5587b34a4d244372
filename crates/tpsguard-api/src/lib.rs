// tpsguard-api: Session-authenticated async client for the TPS appliance web API

pub mod appliance;
pub mod auth;
pub mod error;
pub mod session;
pub mod transport;

pub use appliance::ApplianceClient;
pub use auth::{AppliancePaths, Credentials};
pub use error::Error;
pub use session::{SessionCache, SessionManager};
pub use transport::{RetryConfig, TlsMode, TransportConfig};
