//! State shared between the master and joiner processes

pub mod arena;
pub mod pool;
pub mod state;

pub use arena::{Arena, SharedBlock, SharedRegion};
pub use pool::ArenaSurfacePools;
pub use state::{LogicalMode, SharedDisplay};
