pub mod bearer;

pub use bearer::{BearerAuth, layer};
