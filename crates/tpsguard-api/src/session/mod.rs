// Cookie session handling: login, revalidation, and the on-disk cache.

pub mod cache;
pub mod manager;

pub use cache::{CookieMap, SessionCache};
pub use manager::{Session, SessionManager};
