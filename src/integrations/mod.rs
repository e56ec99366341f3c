//! External collaborators.

pub mod transport {
    pub use crate::transport::*;
}

pub mod trace_log {
    pub use crate::trace_log::*;
}
