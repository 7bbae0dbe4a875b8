pub mod analysis;
pub mod error;
pub mod har;
pub mod wire;

pub use error::{Error, Result};
