//! Per-request orchestration of the Lookout debug channel.
//!
//! A [`Connector`] is built once from a [`ConnectorBuilder`] (or from a
//! config through [`bootstrap`]) and shared across requests. Each request
//! gets a [`RequestScope`]:
//!
//! 1. [`Connector::begin`] checks the client marker against the security
//!    policy and runs a pending evaluation request.
//! 2. Application code and the [`Handler`] queue packets on the scope.
//! 3. [`RequestScope::finish`] delivers packets postponed by the previous
//!    request first, then frames the queue into the `X-Lookout` header,
//!    postponing whatever does not fit or the whole queue on a redirect.
//!
//! Nothing in this crate fails the host response.

mod bootstrap;
mod builder;
mod connector;
mod error;
mod eval;
mod handler;

pub use bootstrap::{bootstrap, Bootstrap};
pub use builder::ConnectorBuilder;
pub use connector::{Connector, RequestScope};
pub use error::ConnectorError;
pub use eval::{EvalContext, EvalDispatcher, EvalError, EvalJob, EvalSandbox, EvalState};
pub use handler::{ErrorReport, ErrorSink, ExceptionReport, Handler, HandlerOptions};
