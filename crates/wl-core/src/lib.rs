//! Core domain logic for web access log sessionization.
//!
//! This crate contains the fundamental types and logic for:
//! - Timelines: per-client events in time order with inter-event gaps
//! - Sessionization: splitting a timeline on inactivity gaps
//! - Window sweeps: session-size histograms across many candidate windows
//! - Window selection: picking a session window from a sweep
//! - Metrics: session durations, distinct resources and client engagement

mod analysis;
pub mod event;
pub mod metrics;
pub mod select;
pub mod sessionize;
pub mod sweep;
pub mod timeline;
pub mod types;

pub use analysis::{
    Analysis, AnalysisConfig, DEFAULT_MAX_WINDOW, DEFAULT_WINDOW_MINUTES, SweepReport,
    WindowPolicy, WindowSource, analyze, analyze_with, discover, sessionize_all,
};
pub use event::Event;
pub use metrics::{EngagementRecord, MetricsReport, RunTotals, SessionStats, aggregate};
pub use select::{FirstUptick, WindowSelector, find_upticks, recommended_window};
pub use sessionize::{Session, SessionSpans, sessionize};
pub use sweep::{SIZE_BUCKETS, SessionSizeHistogram, TOTAL_SLOT, WindowSweep, sweep};
pub use timeline::{Timeline, build_timelines};
pub use types::{ClientId, ValidationError};
