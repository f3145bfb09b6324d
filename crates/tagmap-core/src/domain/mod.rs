pub mod ids;
pub mod normalize;
pub mod records;
pub mod rows;
pub mod status;

pub use ids::{AccountId, TagId};
pub use normalize::{normalize_email_key, normalize_tag_key, trim_value, TagMatching};
pub use records::{AccountRecord, TagRecord};
pub use rows::{InputRow, NormalizedRow, Resolution, ResolvedRow, SkipReason};
pub use status::RowStatus;
