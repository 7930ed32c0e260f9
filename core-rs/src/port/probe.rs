/**
 * probe.rs
 * Best-effort OS-level port availability check
 *
 * Only used when the operator asks for it (`--validate-ports`). A failed
 * probe that is not clearly "address in use" counts as available.
 */

use std::io::ErrorKind;
use std::net::TcpListener;

/// Test if port can be bound on 127.0.0.1
///
/// # Returns
/// false only when the bind fails because something else holds the port
pub fn is_port_available(port: u16) -> bool {
    match TcpListener::bind(("127.0.0.1", port)) {
        Ok(_) => true,
        Err(e) => {
            let in_use = matches!(e.kind(), ErrorKind::AddrInUse);
            if !in_use {
                tracing::debug!(port, error = %e, "port probe inconclusive, assuming available");
            }
            !in_use
        }
    }
}
