//! Services
//!
//! - **CategorySync**: applies rule submissions to category indexes

pub mod category_sync;

pub use category_sync::{
    diff_categories, CategoryDiff, CategoryResult, CategoryState, CategorySyncService,
    FailedCategory, FormType, SyncReport, SyncRequest,
};
