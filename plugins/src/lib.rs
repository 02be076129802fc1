pub mod demo;
pub mod factory;
pub mod reporter;
