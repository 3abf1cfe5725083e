pub mod geo;
pub mod map_config;
pub mod overlay;
pub mod popup;
pub mod records;
pub mod style;

pub use map_config::MapConfig;
pub use overlay::*;
pub use records::*;
