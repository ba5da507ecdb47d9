//! Write-side services built on the models.

pub mod catalog;
pub mod suggestion;
