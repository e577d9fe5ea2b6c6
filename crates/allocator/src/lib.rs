//! Allocation strategies, the allocation manager, and report generator.

pub mod manager;
pub mod reporter;
pub mod strategy;
pub mod uniform;

pub use manager::Manager;
pub use strategy::AllocationStrategy;
pub use uniform::Uniform;
