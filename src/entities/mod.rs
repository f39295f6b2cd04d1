pub mod currency;
pub mod material;
pub mod partner;

pub use material::MaterialType;
