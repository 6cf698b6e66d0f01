use std::{fs::{self, File}, path::Path};

use polars::prelude::{CsvWriter, SerWriter};

use crate::{
    data::table::Table,
    error::{DataError, IoError, StockscopeResult},
};

pub trait ToCsv {
    /// Writes the table to `path` as a headered CSV file.
    ///
    /// # Side Effects
    /// - Creates the parent directory if missing.
    /// - Overwrites the file if it exists.
    fn to_csv(&self, path: impl AsRef<Path>) -> StockscopeResult<()>;
}

impl<T> ToCsv for T
where
    T: Table,
{
    fn to_csv(&self, path: impl AsRef<Path>) -> StockscopeResult<()> {
        let file_path = path.as_ref();

        if let Some(dir) = file_path.parent().filter(|d| !d.as_os_str().is_empty())
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| {
                IoError::FileSystem(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = File::create(file_path).map_err(|e| {
            IoError::WriteFailed(format!("Failed to create '{}': {e}", file_path.display()))
        })?;

        let mut df = self.as_df().clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| {
                DataError::DataFrame(format!(
                    "Failed to write CSV to '{}': {e}",
                    file_path.display()
                ))
            })?;

        Ok(())
    }
}
