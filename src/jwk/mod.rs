mod cache;
mod config;
mod error;
mod http;
mod key;
mod material;
mod resolver;
mod retriever;
mod verifier;

pub use error::*;

pub use cache::*;
pub use config::*;
pub use key::*;
pub use material::*;
pub use resolver::*;
pub use retriever::*;
pub use verifier::*;

#[cfg(test)]
pub(crate) use verifier::tests as test_keys;
