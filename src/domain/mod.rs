//! Domain types and models

pub mod catalog;
pub mod image;
mod mockup;

pub use catalog::{Product, ProductCatalog, EDIT_SUGGESTIONS};
pub use self::image::ImageData;
pub use mockup::{LogoAsset, MockupVersion};
