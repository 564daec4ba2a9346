//! CLI command implementations

mod cover;
mod info;
mod plain;
mod set;

pub use cover::cover;
pub use info::info;
pub use plain::plain;
pub use set::set;

use anyhow::{bail, Result};
use ebookmeta_core::Resource;
use std::path::Path;

/// Resources for the given paths; every path must exist
fn resources(inputs: &[String]) -> Result<Vec<Resource>> {
    inputs
        .iter()
        .map(|input| {
            let path = Path::new(input);
            if !path.is_file() {
                bail!("Input file not found: {}", input);
            }
            Ok(Resource::new(path))
        })
        .collect()
}
