//! Location resolution.
//!
//! Turns a place name or a `lat,lon` pair into a validated [`Region`].
//!
//! [`Region`]: crate::models::Region

pub mod geocoder;
pub mod resolver;

pub use resolver::{LocationQuery, LocationResolver};
