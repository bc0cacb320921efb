pub mod enforcement;
pub mod jwt;
