//! Movement and collision for axis-aligned 2D bodies.
//!
//! [`MovementStepper`] advances one body through a set of others in small
//! sub-steps, resolving each axis separately. The same function drives the
//! authoritative server tick and the client reconciler's "where would the
//! server have this body now" question, so it reads nothing but its inputs.

mod body;
mod stepper;
mod trace;

pub use body::{Body, BodyClass, intersects};
pub use stepper::{MAX_MOVEMENT_STEP, MovementStepper, TIME_SCALE, Touch};
pub use trace::{TraceHit, segment_intersection, trace_segment};
