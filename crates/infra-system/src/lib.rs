// Linguard Infrastructure - System Adapters
// Implements: ProcessLauncher, ProcessProbe, SystemProbe (ADR-002)

pub mod service_control;
pub mod subprocess_launcher;
pub mod system_probe_impl;

pub use service_control::{
    platform_service_control, NoopServiceControl, SystemdServiceControl, WindowsServiceControl,
};
pub use subprocess_launcher::{SubprocessLauncher, ENGINE_LOG_TARGET};
pub use system_probe_impl::SystemProbeImpl;
