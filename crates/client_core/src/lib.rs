//! Client side of the plant disease treatment service: a session controller
//! that drives the backend API and reports every change through a view.

pub mod backend;
pub mod controller;
pub mod error;
pub mod notify;
pub mod render;
pub mod state;
pub mod view;

pub use backend::{HttpBackend, ImageUpload, TreatmentBackend};
pub use controller::Controller;
pub use error::{BackendError, ControllerError};
pub use notify::{Notification, NotificationLevel, NOTIFICATION_LIFETIME};
pub use render::HtmlView;
pub use state::{Phase, SessionState, TreatmentOutcome};
pub use view::{View, ViewUpdate};
