pub mod email;
pub mod engine;
pub mod notifier;

pub use email::EmailNotifier;
pub use engine::{AlertEngine, AlertKind, AlertState, PriceObserver, Thresholds};
pub use notifier::{run_alert_dispatcher, AlertEvent, ChannelNotifier, DispatchSummary, Notifier};
