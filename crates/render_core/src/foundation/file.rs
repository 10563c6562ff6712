//! File system helpers

use std::path::Path;

/// Read a whole file into memory
///
/// Returns `None` (after logging) when the file cannot be opened or read;
/// callers decide whether that is fatal.
pub fn read_file(path: impl AsRef<Path>) -> Option<Vec<u8>> {
    let path = path.as_ref();
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            log::error!("Can't open file {}: {}", path.display(), err);
            None
        }
    }
}
