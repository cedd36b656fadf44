pub mod error;

pub use error::{ReadscaleError, Result};
