//! teomon-services — peer registry, presentation, health monitoring,
//! transport and command handling for the Teomon collector.

pub mod commands;
pub mod dispatch;
pub mod health;
pub mod monitor;
pub mod registry;
pub mod render;
pub mod storage;
pub mod tcp;
pub mod transport;

pub use commands::{CommandHandler, ListHandler, MetricHandler, ParameterHandler, SaveHandler};
pub use dispatch::{frame, CommandDispatcher};
pub use health::HealthMonitor;
pub use monitor::Monitor;
pub use registry::{PeerRegistry, RegistryError};
pub use render::{peer_views, render_json, render_table, sort_for_display, PeerView};
pub use tcp::{Inbound, TcpTransport, MAX_FRAME};
pub use transport::{Dialer, Transport, TransportEvent};
