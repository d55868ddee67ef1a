pub mod chunker;
pub mod error;
pub mod jobs;
pub mod model;
pub mod normalizer;
pub mod numbers;
pub mod repair;
pub mod service;

pub use error::ConversionError;
pub use jobs::{ConversionJob, JobRegistry, JobStatus};
pub use model::{Conversion, ConversionSummary};
pub use service::{ConversionService, SubmitRequest};
