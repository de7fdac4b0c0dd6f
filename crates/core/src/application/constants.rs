// Supervisor constants (ADR: No magic values)
use std::time::Duration;

/// Bound on joining the monitor task during Stop() before it is aborted
pub const MONITOR_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Slack on top of the service wait before a service start/stop is abandoned
pub const SERVICE_CONTROL_GRACE: Duration = Duration::from_secs(5);

/// Capacity of the transition event stream; slow subscribers lag, never block
pub const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// Longest engine error body echoed back to callers
pub const MAX_ENGINE_DETAIL_CHARS: usize = 200;
