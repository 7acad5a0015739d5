// rtypes-common - Shared error taxonomy and duration quantization for RemoteTypes
//
// Both modules are pure: nothing here touches the network.

pub mod duration;
pub mod error;

// Re-export for convenience
pub use duration::*;
pub use error::*;
