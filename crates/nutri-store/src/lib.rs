pub mod config;
pub mod device;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;

pub use config::Config;
pub use device::{DeviceSource, DeviceStore, MealOutcome, default_base_dir};
pub use error::{Result, StoreError};
pub use json_bridge::ImportSummary;
pub use store::Store;
