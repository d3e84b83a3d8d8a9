//! Domain models for the storefront session.

pub mod session;
pub mod user;

pub use session::Session;
pub use user::{Address, AddressError, CheckoutAddresses, Customer};
