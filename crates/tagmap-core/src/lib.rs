pub mod apply;
pub mod batch;
pub mod domain;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod reconcile;
pub mod report;

pub use apply::{dispatch_batches, ApplyFailure, ApplyMode, BatchOutcome, BatchResult, TagApplier};
pub use batch::{plan_batches, validate_batch_size, Batch, EMAIL_BATCH_LIMIT};
pub use domain::*;
pub use error::CoreError;
pub use export::{BatchLogRecord, MappedRecord, ResultRecord};
pub use pipeline::{apply_mapping, map_upload, Mapping, Upload};
pub use reconcile::{reconcile, KeyCollision, KeyIndex};
pub use report::{build_report, ApplyReport, Summary};
