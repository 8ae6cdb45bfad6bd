pub mod heartbeat;
pub mod session_token;
pub mod user;
