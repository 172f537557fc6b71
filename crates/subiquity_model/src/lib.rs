pub mod autoinstall;
pub mod base_model;
pub mod controller;
pub mod error;
pub mod submodels;

pub use base_model::InstallModel;
pub use controller::{Controller, GenericStatus};
pub use error::{AutoinstallError, ControllerError};
