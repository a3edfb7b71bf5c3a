//! Resource-strategy planning.
//!
//! Translates the committed settings plus a hardware capability snapshot
//! into the concrete execution policy handed to the inference collaborator.
//! `plan` is a pure function of its inputs: it is re-evaluated on every
//! generation request and at process start, never cached, since both the
//! settings and the visible hardware can change between requests.

use crate::models::settings::{
    ModelRetention, OffloadMode, Precision, ResourceStrategySettings,
};
use std::path::Path;

/// Device a pipeline executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Xpu,
    Cpu,
}

/// Kind of accelerator detected on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceleratorKind {
    Cuda,
    Xpu,
}

/// Point-in-time view of the hardware the service may execute on.
#[derive(Debug, Clone)]
pub struct HardwareSnapshot {
    /// Best available accelerator, if any
    pub accelerator: Option<AcceleratorKind>,

    /// Total host memory in bytes
    pub total_memory_bytes: u64,
}

impl HardwareSnapshot {
    /// Probe the host.
    ///
    /// CUDA is detected through the NVIDIA driver's proc/dev interfaces,
    /// XPU through a compute-accelerator device node. Host memory comes
    /// from sysinfo.
    pub fn detect() -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();

        Self {
            accelerator: detect_accelerator(),
            total_memory_bytes: sys.total_memory(),
        }
    }
}

/// Detect and return the best available accelerator (CUDA, then XPU).
fn detect_accelerator() -> Option<AcceleratorKind> {
    if Path::new("/proc/driver/nvidia/version").exists() || Path::new("/dev/nvidiactl").exists() {
        return Some(AcceleratorKind::Cuda);
    }
    if Path::new("/dev/accel/accel0").exists() {
        return Some(AcceleratorKind::Xpu);
    }
    None
}

/// Concrete execution policy consumed by the inference collaborator.
///
/// Settings express intent; the policy is what the hardware can actually
/// honor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPolicy {
    pub device: Device,
    pub precision: Precision,
    pub offload_mode: OffloadMode,
    pub model_retention: ModelRetention,
}

/// Map settings and hardware to an execution policy.
///
/// # Rules (priority order)
///
/// 1. No accelerator: everything runs on the general-purpose processor.
///    Offloading is meaningless there and is forced off, and both fp16 and
///    int8 downgrade to fp32: half precision is an accelerator format and
///    the quantization backend requires CUDA.
/// 2. XPU: honored as the device, but the precision downgrades apply for
///    the same reason (the quantization backend is CUDA-only, fp16 is only
///    selected for CUDA).
/// 3. CUDA: the committed settings are honored verbatim.
pub fn plan(settings: &ResourceStrategySettings, hardware: &HardwareSnapshot) -> ExecutionPolicy {
    match hardware.accelerator {
        Some(AcceleratorKind::Cuda) => ExecutionPolicy {
            device: Device::Cuda,
            precision: settings.precision,
            offload_mode: settings.offload_mode,
            model_retention: settings.model_retention,
        },
        Some(AcceleratorKind::Xpu) => ExecutionPolicy {
            device: Device::Xpu,
            precision: Precision::Fp32,
            offload_mode: settings.offload_mode,
            model_retention: settings.model_retention,
        },
        None => ExecutionPolicy {
            device: Device::Cpu,
            precision: Precision::Fp32,
            offload_mode: OffloadMode::None,
            model_retention: settings.model_retention,
        },
    }
}
