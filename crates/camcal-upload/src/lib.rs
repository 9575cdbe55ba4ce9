mod client;
mod descriptor;
mod error;
mod status;
mod worker;

pub use client::{HttpTransport, UploadTransport};
pub use descriptor::{
    DescriptorBuilder, FormEntry, UploadForm, create_queue_dir, next_descriptor, parse_descriptor,
};
pub use error::{TransportError, UploadError};
pub use status::{StatusBoard, UploadStatus};
pub use worker::{CycleFailure, CycleReport, UploadQueue, UploadSettings, drain_queue};
