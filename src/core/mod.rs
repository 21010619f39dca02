// Domain-layer modules and shared errors/models
pub mod address {
    pub use crate::address::*;
}

pub mod admission {
    pub use crate::admission::*;
}

pub mod buildings {
    pub use crate::buildings::*;
}

pub mod notifier {
    pub use crate::notifier::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
