//! Call wiring between the voice-call runtime and the response bridge

pub mod session;

pub use session::{CallEnd, CallEvent, CallHandle, CallSession};
