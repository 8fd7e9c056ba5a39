//! Domain crate for the live-tournament control plane.
//!
//! Holds the pure bracket engine (no I/O), the shared data model, the error
//! taxonomy, and the port traits that every other crate in the workspace
//! implements or consumes. Nothing here touches a database, a socket, or a
//! clock beyond what callers pass in.

pub mod bracket;
pub mod errors;
pub mod model;
pub mod ports;
pub mod utils;

pub use bracket::*;
pub use errors::*;
pub use model::*;
pub use ports::*;
