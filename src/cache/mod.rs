//! Two-tier cache: an in-process [`TtlMap`] backed by an optional
//! content-addressed [`DiskTier`]. SPEC_FULL §4.1/§4.2.

pub mod disk_tier;
pub mod ttl_map;

pub use disk_tier::{DiskTier, Hit, MaintenanceHandle};
pub use ttl_map::TtlMap;
