//! Node services used by the event loop and the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `node` owns the event loop. The other modules hold the state machines and
//! I/O tasks it drives, so route handlers stay focused on protocol
//! translation.

pub mod acceptor;
pub mod broadcast;
pub mod calibration;
pub mod clients;
pub mod node;
pub mod projector;
pub mod startup;
pub mod status;
