//! External service integrations.

pub mod feed_client {
    pub use crate::feed_client::*;
}

pub mod telegram_client {
    pub use crate::telegram_client::*;
}
