mod customer;
mod error;
mod inventory;
mod platform;
mod purchase;

pub use customer::*;
pub use error::*;
pub use inventory::*;
pub use platform::*;
pub use purchase::*;
