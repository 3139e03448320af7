//! Data processing modules.
pub mod rolling;

pub use rolling::RollingWindow;
