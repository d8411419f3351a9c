pub mod crs;
pub mod crs_utils;
pub mod reproject;
pub mod same_crs;

pub use self::crs::Crs;
pub use self::same_crs::SameCrs;
