pub mod connection;
pub mod event_loop;
pub mod history;
pub mod listener;
pub mod registry;
pub mod relay;
pub mod session;
pub mod shutdown;
pub mod state;

pub use connection::{ConnectionError, ConnectionHandle, LineReader};
pub use event_loop::{run, serve};
pub use history::HistoryStore;
pub use listener::RelayListener;
pub use registry::{ClientSession, ConnectionRegistry};
pub use relay::Relay;
pub use session::{SessionEnd, SessionWorker};
pub use shutdown::{DrainReport, ShutdownCoordinator, ShutdownReason, drain_sessions};
pub use state::{
    Departure, RelayState, RoutedMessage, SharedRelayState, lock_state, new_relay_state,
};
