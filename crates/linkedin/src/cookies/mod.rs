//! Session cookies and their on-disk cache.

mod cookie;
mod repository;

pub use cookie::{CookieSet, SESSION_COOKIE, StoredCookie};
pub use repository::CookieRepository;
