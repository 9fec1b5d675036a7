pub mod capture;
pub mod error;
pub mod extract;
pub mod fields;
pub mod http;
pub mod session;
pub mod speech;
pub mod store;
pub mod transcribe;
pub mod types;

pub use error::*;
pub use types::*;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
