//! Shared data model for the KPI alerting and scheduled reporting services.
//!
//! Every tenant-scoped record in [`types`] is owned by a resolved
//! [`tenant::TeamId`], never by the raw caller identity.

pub mod i18n;
pub mod id;
pub mod tenant;
pub mod types;
