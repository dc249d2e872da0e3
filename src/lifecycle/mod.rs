//! Process lifecycle: graceful shutdown coordination for the daemon's
//! listeners.

pub mod shutdown;

pub use shutdown::Shutdown;
