//! Statement text rendering.
//!
//! # Modules
//!
//! - [`serializer`]: typed values to literal text
//! - [`placeholder`]: `${}` / `#{}` template resolution
//! - [`query`]: templates with parameters, sort and paging

pub mod placeholder;
pub mod query;
pub mod serializer;

pub use placeholder::{resolve, Dialect, Modifier};
pub use query::{Direction, Order, Page, Query};
pub use serializer::{escape, property_literal, quote, to_literal};
