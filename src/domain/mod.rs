pub mod appointment;
pub mod cart;
pub mod events;
pub mod order;
pub mod receipt;
pub mod support;
pub mod user;
