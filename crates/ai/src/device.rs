use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{DType, Device};
use tracing::{info, warn};

/// Pick the compute device once: CUDA first, then Metal, then the CPU.
///
/// Accelerators are only considered when the crate is built with the
/// matching `cuda` or `metal` feature.
pub fn select_device() -> Device {
    if cuda_is_available() {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("using CUDA device 0");
                return device;
            }
            Err(e) => warn!("CUDA not available, defaulting to CPU: {e}"),
        }
    }

    if metal_is_available() {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("using Metal device 0");
                return device;
            }
            Err(e) => warn!("Metal not available, defaulting to CPU: {e}"),
        }
    }

    info!("using CPU");
    Device::Cpu
}

/// Half precision on accelerators, full precision on the CPU.
pub fn working_dtype(device: &Device) -> DType {
    if device.is_cpu() {
        DType::F32
    } else {
        DType::F16
    }
}
