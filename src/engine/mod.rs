// Encoder selection and pipeline engine - independent of the CLI surface

pub mod catalog;
pub mod devices;
pub mod error;
pub mod launch;
pub mod pipeline;
pub mod platform;
pub mod select;
pub mod transport;
pub mod types;
pub mod verify;

pub use error::{Result, StreamError};
pub use pipeline::{BuildOptions, PipelineSpec, StageDescriptor};
pub use platform::{EncoderCandidate, PlatformProfile};
pub use types::{Protocol, Resolution, StreamRequest};
