use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{AppError, Result};

/// Pack `(name, bytes)` entries into an in-memory ZIP, in the given order.
pub fn zip_entries<I, N>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (N, Vec<u8>)>,
    N: Into<String>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in entries {
        zip.start_file(name.into(), options)?;
        zip.write_all(&bytes)
            .map_err(|e| AppError::upstream("zip", format!("failed to write entry: {e}")))?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Read one entry of a ZIP container as UTF-8 text.
pub fn read_entry_to_string(archive: &[u8], name: &str) -> Result<String> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut entry = zip.by_name(name)?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| AppError::upstream("zip", format!("failed to read {name}: {e}")))?;
    Ok(text)
}
