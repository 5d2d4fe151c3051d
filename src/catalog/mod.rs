//! Catalog source adapter
//!
//! [`CatalogSource`] is the seam between the crawler and the outside world.
//! [`AddonClient`] implements it over HTTP; tests use the mock in
//! [`crate::testing`].

mod addon;
mod source;
mod types;

pub use addon::{build_http_client, AddonClient};
pub use source::{CatalogSource, SourceError, SourceResult};
pub use types::{
    CatalogDescriptor, CatalogPage, CatalogSelection, CatalogType, Item, ItemType, StreamInfo,
};
