pub mod clicks;
pub mod geoip;
pub mod rate_guard;
pub mod safety;
pub mod sweeper;
pub mod trace;
pub mod ua;
pub mod webhook;

pub use clicks::{ClickContext, ClickRecorder};
pub use geoip::{GeoInfo, GeoIpProvider};
pub use rate_guard::{RateBucket, RateGuard};
pub use safety::{Classification, SafetyClassifier, Verdict, WarningTag};
pub use sweeper::{HealthSweeper, SweepEntry};
pub use trace::RedirectTracer;
pub use webhook::{WebhookEventKind, WebhookNotifier};
