#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

pub mod constants;
pub mod context;
pub mod models;
pub mod store;

pub use crate::constants::*;
pub use crate::context::*;
pub use crate::models::*;
pub use crate::store::*;
