//! Reconciles the external compute/volume registries against live cloud
//! state and publishes capacity metrics (spec §4.8).

pub mod monitor;
pub mod registries;

pub use monitor::{CleanupSummary, HealthCheckSummary, InfrastructureMonitor};
pub use registries::{
    CloudInstanceState, CloudProvider, ComputeEntry, ComputeRegistry, MetricGauge, MetricsSink,
    VolumeEntry, VolumeRegistry,
};
