pub mod mime;
pub mod walk;

pub use walk::discover_assets;
