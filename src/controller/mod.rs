//! UI-facing controllers driving the service from view state.
pub mod form;
pub mod list;

pub use form::{defaults, Confirm, FormController, FormMode, SubmitOutcome};
pub use list::ListController;
