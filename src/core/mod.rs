// Marshaling and signing layer
pub mod auth {
    pub use crate::auth::*;
}

pub mod codec {
    pub use crate::codec::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
