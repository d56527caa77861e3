//! Incremental camera importer
//!
//! Copies photos and videos from a camera's capture-session folders into
//! dated destination folders, skipping anything already copied, and serves
//! cached previews of the images on the card.

pub mod error;
pub mod logging;
pub mod preview;
pub mod state;
pub mod transfer;

pub use error::{CacheError, ConfigError, PreviewError, TransferError};
pub use preview::PreviewService;
pub use state::config::AppConfig;
pub use state::data::{Category, CopyProgress, CopyResult, Thumbnail};
pub use transfer::{build_destination_path, classify, plan_and_copy, CopyRequest};
