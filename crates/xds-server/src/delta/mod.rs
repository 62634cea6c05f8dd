//! Delta xDS protocol engine.
//!
//! - [`SubscriptionTracker`] - per-type subscription and acknowledgement state
//! - [`ChildInvalidator`] - resends children after a parent update
//! - [`UPDATE_ORDER`] - cross-type delivery order and gating
//! - [`DeltaSession`] - the per-stream loop tying them together

pub mod child;
pub mod order;
pub mod session;
pub mod tracker;

pub use child::ChildInvalidator;
pub use order::{gated_by, UpdateStep, UPDATE_ORDER};
pub use session::{DeltaSession, ResponseSender, SessionState};
pub use tracker::{AppliedUpdate, Diff, PendingUpdate, RecvOutcome, SubscriptionTracker};
