mod controller;
mod error;
mod events;
mod session;

pub use controller::FlowController;
pub use error::FlowError;
pub use session::{CalibrationSession, Collaborators};

#[cfg(test)]
mod tests;
