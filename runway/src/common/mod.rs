//! Common types shared by the engine, the ports and the adapters.

mod cancellation;
mod constants;
mod document;
mod lock;
mod value;

pub use cancellation::*;
pub use constants::*;
pub use document::*;
pub use lock::*;
pub use value::*;
