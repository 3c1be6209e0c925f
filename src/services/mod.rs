//! Application services.
//!
//! Multi-step operations that span several tables or talk to an external
//! provider live here so handlers stay thin.

pub mod billing;
pub mod campaign;
