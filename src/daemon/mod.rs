pub mod logging;
pub mod runtime;
pub mod state;
pub mod timer;
pub mod types;
