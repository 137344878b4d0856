//! API request handlers.

mod breakers;
mod health;
mod playbooks;
mod recoveries;

pub use breakers::*;
pub use health::*;
pub use playbooks::*;
pub use recoveries::*;
