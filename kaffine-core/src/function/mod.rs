//! Installed functions
//!
//! The [`FunctionManager`] resolves install requests against the loaded
//! catalogs and persists the installed set under `functions/` and
//! `installed.yaml`.

mod installed;
mod manager;

pub use installed::InstalledFunction;
pub use manager::{
    CatalogRemoval, DroppedDependency, FunctionManager, Installation, LoadReport, UpdateReport,
    Upgrade, INSTALLED_CATALOG_NAME,
};
