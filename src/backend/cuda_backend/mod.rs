//! CUDA runtime backend
//!
//! Links `libcudart` and implements [`crate::backend::GpuRuntime`] on top of
//! it. Only compiled with the `cuda` feature.

pub mod ffi;
mod runtime;

pub use runtime::{get_error_string, CudaRuntime};
