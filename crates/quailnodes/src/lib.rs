//! Standard node library
//!
//! Dataset loaders and the common data-quality checks

mod checks;
mod dataset;
mod support;

pub use checks::{
    NotNullCheck, NotNullFactory, RangeCheck, RangeFactory, RowCountCheck, RowCountFactory,
    UniqueCheck, UniqueFactory,
};
pub use dataset::{InlineDatasetFactory, InlineDatasetNode, JsonDatasetFactory, JsonDatasetNode};
use quailruntime::NodeCatalog;

use std::sync::Arc;

/// Register all standard node types with a catalog
pub fn register_all(catalog: &mut NodeCatalog) {
    catalog.register(Arc::new(dataset::JsonDatasetFactory));
    catalog.register(Arc::new(dataset::InlineDatasetFactory));
    catalog.register(Arc::new(checks::RowCountFactory));
    catalog.register(Arc::new(checks::NotNullFactory));
    catalog.register(Arc::new(checks::UniqueFactory));
    catalog.register(Arc::new(checks::RangeFactory));
}

/// A catalog holding every standard node type
pub fn standard_catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();
    register_all(&mut catalog);
    catalog
}
