//! Service layer (component G): the teacher's `s3/handlers.rs` handler
//! bodies lifted into standalone, HTTP-agnostic services so the axum
//! handlers in `handlers/` stay thin request/response adapters.

pub mod bucket;
pub mod content;
pub mod object;
pub mod upload;

pub use bucket::BucketService;
pub use content::ContentService;
pub use object::ObjectService;
pub use upload::UploadService;
