//! teomon-core — wire format, parameter and metric records, configuration.
//! All other Teomon crates depend on this one.

pub mod config;
pub mod metric;
pub mod param;
pub mod params;
pub mod wire;

pub use metric::{decode_peers, encode_peers, MetricRecord};
pub use param::{Parameter, Value, ValueKind};
pub use params::ParameterStore;
pub use wire::WireError;
