use crate::error::IngestError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

const BLOCK_SIZE: usize = 8192;

/// Hex SHA-256 of the file content, read in fixed-size blocks.
pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let mut file = File::open(path).map_err(|error| match error.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            IngestError::NotFound(path.to_path_buf())
        }
        _ => IngestError::Io(error),
    })?;

    digest_reader(&mut file)
}

pub fn digest_reader(reader: &mut impl Read) -> Result<String, IngestError> {
    let mut hasher = Sha256::new();
    let mut block = [0u8; BLOCK_SIZE];

    loop {
        let read = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(IngestError::Io(error)),
        };
        hasher.update(&block[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
