use std::error::Error;

pub mod config;
pub mod error;
pub mod github;
pub mod karakeep;
pub mod model;
pub mod scheduler;
pub mod sync;

pub fn unpack_error(err: &dyn Error) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
