//! Pack command - build an archive from a directory of manifests

use console::style;
use std::path::Path;

use crate::error::Result;

pub fn run(dir: &Path, output: Option<&Path>) -> Result<()> {
    let archive = opkit_core::pack_directory(dir)?;

    match output {
        Some(path) => {
            std::fs::write(path, &archive)?;
            println!(
                "{} {} ({} bytes)",
                style("Created").green().bold(),
                path.display(),
                archive.len()
            );
        }
        None => println!("{}", archive),
    }

    Ok(())
}
