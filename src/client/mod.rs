// Client side: persisted session, backends and the application controller
pub mod backend;
pub mod controller;
pub mod rest;
pub mod session;

pub use backend::{Backend, LocalBackend};
pub use controller::{ready_signal, AppController, AppState, ReadySignal, ReadyWaiter, SaveStatus};
pub use rest::RestBackend;
pub use session::{Session, SessionStore};
