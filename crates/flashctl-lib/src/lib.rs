//! flashctl: keeps a camera flash, an external policy flag that can force it
//! on, and the user's saved intensity consistent with each other.

pub mod actuator;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod intensity;
pub mod policy;
pub mod store;

pub use error::FlashctlError;
