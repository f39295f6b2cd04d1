pub mod currencies;
pub mod materials;
pub mod partners;
pub mod seed;
