//! Connection management: transport frames, sessions, the session
//! registry, and the per-session I/O loops.

pub mod driver;
pub mod hub;
pub mod session;
pub mod transport;

pub use driver::{FrameHandler, SessionDriver, SessionTiming};
pub use hub::Hub;
pub use session::{EnqueueError, Session, SessionState};
pub use transport::{Frame, FrameSink, FrameStream, TransportError};
