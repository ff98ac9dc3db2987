//! Careflow Registry
//!
//! The action registry maps a node kind's dispatch key (`notification`,
//! `api-call`, `equipment.assign`, ...) to the handler that performs the side
//! effect. The execution engine receives one registry instance through its
//! constructor.

mod error;
mod handler;
mod registry;

pub use error::{ActionError, RegistryError};
pub use handler::{ActionHandler, EchoHandler, FnHandler};
pub use registry::{ActionRegistry, HandlerRegistry};
