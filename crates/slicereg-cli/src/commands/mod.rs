pub mod align;
pub mod config;
pub mod methods;
pub mod register;
