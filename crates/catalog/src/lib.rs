//! Catalog module: products and suppliers referenced by the kardex.
//!
//! The kardex engine treats these entities as read-only references, resolved
//! through the [`Catalog`] lookup trait.

pub mod lookup;
pub mod product;
pub mod supplier;
mod text;

pub use lookup::{Catalog, CatalogError, InMemoryCatalog};
pub use product::{NewProduct, Product};
pub use supplier::{Location, NewSupplier, Supplier};
