//! Shared helpers for the Conduit integration tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory holding the sample `.cdt` programs.
pub fn examples_dir() -> PathBuf {
    // tests run from the conduit-tests crate; examples live at ../conduit-examples
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../conduit-examples")
}

pub fn read_example(name: &str) -> io::Result<String> {
    fs::read_to_string(examples_dir().join(name))
}

/// Every `.cdt` file in the examples directory, sorted by name.
pub fn example_files() -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(examples_dir())? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("cdt") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
