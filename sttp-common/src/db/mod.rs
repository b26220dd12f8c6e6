//! Database helpers shared by the STTP repositories

pub mod init;
pub mod retry;

pub use init::{init_pool, ping};
pub use retry::retry_on_lock;
