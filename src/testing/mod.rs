//! Test support shared by unit and integration tests

mod mock_source;

pub use mock_source::{MockCatalogSource, SourceCall};
