pub mod jwt;
pub mod password;
pub mod presence;
pub mod rate_limit;
pub mod session;
pub mod totp;
pub mod twofa;

pub use jwt::{Claims, TokenKind};
pub use password::{hash_password, verify_password};
pub use presence::{DbPresence, PresenceTracker, RedisPresence};
pub use rate_limit::RateLimiter;
pub use session::{DbSessionStore, RedisSessionStore, SessionStore};
pub use totp::{generate_totp_secret, verify_totp};
pub use twofa::TwoFaState;
