mod backend;
mod backends;
pub mod postprocess;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::ReplayBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::{open_backend, BackendKind};
pub use result::{ClassNames, Detection};
