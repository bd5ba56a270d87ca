// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Keeps a map's geofence overlays in step with a live record feed.
//!
//! The pieces, leaf first:
//!
//! - [`OverlayReconciler`] owns one circle + popup per record and diffs every
//!   snapshot against what is already drawn.
//! - [`InteractionDispatcher`] routes Edit/Delete controls inside the one open
//!   popup to the record they belong to, looked up at click time.
//! - [`CreateFlowController`] stages a single candidate: click, place, resolve
//!   an address, then save or cancel.
//! - [`GeofenceSyncSession`] owns the subscription and the surface and runs
//!   everything above on one task.

use thiserror::Error;

pub mod create_flow;
pub mod dispatch;
pub mod edit_form;
pub mod popup;
pub mod reconcile;
pub mod session;

pub use create_flow::{Candidate, CandidateResolved, CreateFlowController, CreatePhase, LookupTicket};
pub use dispatch::{Dispatch, InteractionDispatcher, PopupAction};
pub use edit_form::EditForm;
pub use reconcile::{OverlayEntry, OverlayReconciler, ReconcileReport};
pub use session::{GeofenceSyncSession, SessionCommand, SessionConfig, SessionHandle, SessionNotice};

/// Alert shown when a candidate cannot be saved.
pub const CREATE_ALERT: &str = "Please select location and fill in all fields.";

/// Alert shown when an edit cannot be submitted.
pub const EDIT_ALERT: &str = "Please fill in all fields.";

/// A form submission was rejected locally; nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No location has been picked.
    #[error("no location selected")]
    MissingLocation,
    /// The picked location has no resolved address.
    #[error("address not resolved")]
    MissingAddress,
    /// Deployment label is blank.
    #[error("deployment is empty")]
    MissingDeployment,
    /// Radius field is blank.
    #[error("radius is empty")]
    MissingRadius,
    /// Radius is not a positive whole number of meters.
    #[error("radius must be a positive whole number of meters")]
    InvalidRadius,
}
