//! Session frame loop
//!
//! [`FrameDriver`] owns the session, the anchor manager, the telemetry
//! throttle and the reporter. Input and lifecycle callbacks reach it as
//! [`DriverEvent`]s, which are applied at the start of the next tick.

pub mod events;
pub mod frame;

pub use events::{DriverEvent, EventSender};
pub use frame::{DriverSettings, FrameDriver, FrameRequest, FrameSource, TickSummary};
