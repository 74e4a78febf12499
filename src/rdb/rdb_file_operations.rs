use std::path::Path;

use tracing::{info, warn};

use crate::{
    key_value_store::KeyValueStore,
    rdb::{RdbError, RdbParser},
};

/// Loads `<directory>/<filename>` at startup.
///
/// Returns `Ok(None)` when either part of the path is unset or the file does
/// not exist; the server then starts empty.
pub async fn load_rdb_file(
    directory: Option<&str>,
    filename: Option<&str>,
) -> Result<Option<KeyValueStore>, RdbError> {
    let (Some(directory), Some(filename)) = (directory, filename) else {
        return Ok(None);
    };

    let file_path = Path::new(directory).join(filename);

    let buffer = match tokio::fs::read(&file_path).await {
        Ok(buffer) => buffer,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %file_path.display(), "snapshot file not found, starting empty");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let parser = RdbParser::parse(&buffer)?;

    info!(
        path = %file_path.display(),
        keys = parser.key_value_store.len(),
        version = parser.version,
        "loaded snapshot"
    );

    Ok(Some(parser.key_value_store))
}
