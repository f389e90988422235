//! FINCACHE Core - Data Types
//!
//! Pure data structures shared by every fincache crate: subject keys,
//! document classes, version labels, financial statements, forecasts,
//! errors and configuration. No I/O lives here.

mod clock;
mod config;
mod document;
mod enums;
mod error;
mod forecast;
mod identity;
mod statement;
mod version;

pub use clock::*;
pub use config::*;
pub use document::*;
pub use enums::*;
pub use error::*;
pub use forecast::*;
pub use identity::*;
pub use statement::*;
pub use version::*;
