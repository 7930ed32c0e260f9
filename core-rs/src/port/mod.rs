/**
 * port module
 * Port range parsing, reservations and lowest-free-port allocation
 */

pub mod allocator;
pub mod assignment;
pub mod probe;
pub mod range;
pub mod reservation;

pub use allocator::{Allocator, VariableSpec};
pub use assignment::{parse_assignment, parse_assignments, Overrides};
pub use probe::is_port_available;
pub use range::{PortRange, MAX_PORT, MIN_PORT};
pub use reservation::{expand_reserved, ReservedPort};
