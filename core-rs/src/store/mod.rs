/**
 * store module
 * Persisted allocation state and the file primitives it relies on
 */

pub mod allocations;
pub mod atomic;
pub mod lock;
pub mod port_map;

pub use allocations::{AllocationStore, AllocationTable, Holder};
pub use atomic::atomic_write;
pub use lock::StateLock;
pub use port_map::PortMap;
