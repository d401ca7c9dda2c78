// Signal generation: indicator snapshot + threshold evaluation
pub mod signals;

pub use signals::{compute_snapshot, evaluate, SignalConfig};
