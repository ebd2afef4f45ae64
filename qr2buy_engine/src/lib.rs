//! qr2buy Engine
//!
//! The engine holds the consistency-critical core of the qr2buy display server: the Product/Device/Order data model,
//! the idempotent sale-fulfillment flow, the device config projection and the admin catalog operations. It is
//! HTTP-framework and payment-provider agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use the public APIs instead. The exception is the data types used in the
//!    database, which are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@api`]). [`FulfillmentApi`] serializes purchase completion, [`CatalogApi`] covers
//!    admin CRUD, linking and the legacy dashboard state, and [`DeviceConfigApi`] computes the payload that physical
//!    displays poll for.
//!
//! The engine also emits events when display-relevant state changes. A simple actor framework ([`mod@events`]) lets
//! the server hook into these events, e.g. to fan changes out to connected displays.
pub mod db_types;
pub mod display;
pub mod events;
pub mod traits;

pub mod api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use api::{
    catalog_api::CatalogApi,
    device_config_api::DeviceConfigApi,
    fulfillment_api::{FulfillmentApi, SaleConfirmation, SaleResolution},
};
