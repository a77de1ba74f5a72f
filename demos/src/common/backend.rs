//! Backend selection for the demo binaries.
//!
//! Cargo features pick the backend at compile time: `cuda` wins over `wgpu`,
//! and ndarray is used when neither is enabled.

use burn::tensor::backend::Backend;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        pub type SelectedBackend = burn::backend::Cuda;
        const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        pub type SelectedBackend = burn::backend::Wgpu;
        const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        pub type SelectedBackend = burn::backend::NdArray;
        const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

pub type SelectedDevice = <SelectedBackend as Backend>::Device;

/// Default device of the selected backend.
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}

/// Human-readable backend name for log lines.
pub const fn get_backend_name() -> &'static str {
    BACKEND_NAME
}
