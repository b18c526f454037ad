//! Device registration entities.

pub mod model;
pub mod status;

pub use model::DeviceRegistration;
pub use status::DeviceStatus;
