// Schema inference
//
// Derives a relational table definition from the column descriptors of one
// representative catalog file. The definition is rendered as MySQL DDL and as
// the parameterized insert statement used by the loader.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog::discover_catalog_files;
use crate::fits::{BinaryTable, FitsError, FitsFile, TForm};

/// Error types for schema inference
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Cannot read sample file {path}: {source}")]
    Fits {
        path: PathBuf,
        #[source]
        source: FitsError,
    },

    #[error("Sample file {path} has no binary table at HDU {index}: {reason}")]
    MissingTable {
        path: PathBuf,
        index: usize,
        reason: String,
    },

    #[error("No catalog files ending in '{extension}' found in {dir}")]
    NoSampleFile { dir: PathBuf, extension: String },

    #[error("Binary table in {path} declares no columns")]
    NoColumns { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Target column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    BigInt,
    Int,
    Float,
    Double,
    Varchar255,
    TinyIntBool,
    Text,
}

impl SqlType {
    /// Map a FITS TFORM type code to its SQL column type
    pub fn for_type_code(code: char) -> Self {
        match code {
            'K' | 'J' => SqlType::BigInt,
            'I' => SqlType::Int,
            'E' => SqlType::Float,
            'D' => SqlType::Double,
            'A' => SqlType::Varchar255,
            'L' => SqlType::TinyIntBool,
            _ => SqlType::Text,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::BigInt => "BIGINT",
            SqlType::Int => "INT",
            SqlType::Float => "FLOAT",
            SqlType::Double => "DOUBLE",
            SqlType::Varchar255 => "VARCHAR(255)",
            SqlType::TinyIntBool => "TINYINT(1)",
            SqlType::Text => "TEXT",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub type_code: char,
    /// Full source format, repeat count included
    pub tform: TForm,
    pub sql_type: SqlType,
}

/// Ordered columns plus the target table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableDefinition {
    pub fn from_table(table_name: impl Into<String>, table: &BinaryTable) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|column| ColumnSchema {
                name: column.name.clone(),
                type_code: column.type_code(),
                tform: column.tform.clone(),
                sql_type: SqlType::for_type_code(column.type_code()),
            })
            .collect();

        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    /// `CREATE TABLE` statement with one line per column, in source order
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("  {} {}", quote_identifier(&c.name), c.sql_type))
            .collect();

        format!(
            "CREATE TABLE {} (\n{}\n);",
            quote_identifier(&self.table_name),
            columns.join(",\n")
        )
    }

    /// Parameterized single-row insert
    pub fn insert_sql(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| quote_identifier(&c.name)).collect();
        let placeholders = vec!["?"; self.columns.len()].join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(&self.table_name),
            names.join(", "),
            placeholders
        )
    }

    /// Check that `table` has the same column names and formats, in order
    pub fn check_layout(&self, table: &BinaryTable) -> Result<(), String> {
        if table.columns.len() != self.columns.len() {
            return Err(format!(
                "expected {} columns, found {}",
                self.columns.len(),
                table.columns.len()
            ));
        }

        for (position, (expected, actual)) in self.columns.iter().zip(&table.columns).enumerate() {
            if expected.name != actual.name || expected.tform != actual.tform {
                return Err(format!(
                    "column {} is {} ({}), expected {} ({})",
                    position + 1,
                    actual.name,
                    actual.tform,
                    expected.name,
                    expected.tform
                ));
            }
        }

        Ok(())
    }
}

/// Backtick-quote a MySQL identifier
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Infers a [`TableDefinition`] from a sample catalog file
#[derive(Debug, Clone)]
pub struct SchemaInference {
    hdu_index: usize,
}

impl Default for SchemaInference {
    fn default() -> Self {
        Self::new(crate::load::DEFAULT_TABLE_HDU)
    }
}

impl SchemaInference {
    pub fn new(hdu_index: usize) -> Self {
        Self { hdu_index }
    }

    /// Read the column descriptors of `sample` and build the definition
    pub fn infer(&self, sample: &Path, table_name: &str) -> Result<TableDefinition, SchemaError> {
        let fits_err = |source| SchemaError::Fits {
            path: sample.to_path_buf(),
            source,
        };

        let file = FitsFile::open(sample).map_err(fits_err)?;
        let table = file.binary_table(self.hdu_index).map_err(|e| match e {
            FitsError::MissingTable { index, found } => SchemaError::MissingTable {
                path: sample.to_path_buf(),
                index,
                reason: format!("found {found}"),
            },
            other => fits_err(other),
        })?;

        if table.columns.is_empty() {
            return Err(SchemaError::NoColumns {
                path: sample.to_path_buf(),
            });
        }

        let definition = TableDefinition::from_table(table_name, &table);
        info!(
            sample = %sample.display(),
            table = table_name,
            columns = definition.columns.len(),
            "Inferred table schema"
        );
        for column in &definition.columns {
            debug!(column = %column.name, code = %column.type_code, sql_type = %column.sql_type, "Mapped column");
        }

        Ok(definition)
    }

    /// Infer from the first catalog file (lexicographic order) in `dir`
    pub fn infer_from_dir(
        &self,
        dir: &Path,
        extension: &str,
        table_name: &str,
    ) -> Result<TableDefinition, SchemaError> {
        let sample = discover_catalog_files(dir, extension)?
            .into_iter()
            .next()
            .ok_or_else(|| SchemaError::NoSampleFile {
                dir: dir.to_path_buf(),
                extension: extension.to_string(),
            })?;

        self.infer(&sample, table_name)
    }

    /// Infer from `path`, which may be a file or a directory of catalog files
    pub fn infer_from_path(
        &self,
        path: &Path,
        extension: &str,
        table_name: &str,
    ) -> Result<TableDefinition, SchemaError> {
        if path.is_dir() {
            self.infer_from_dir(path, extension, table_name)
        } else {
            self.infer(path, table_name)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fits::BinTableWriter;
    use crate::value::RawValue;

    #[test]
    fn test_type_code_mapping() {
        assert_eq!(SqlType::for_type_code('K').as_sql(), "BIGINT");
        assert_eq!(SqlType::for_type_code('J').as_sql(), "BIGINT");
        assert_eq!(SqlType::for_type_code('I').as_sql(), "INT");
        assert_eq!(SqlType::for_type_code('E').as_sql(), "FLOAT");
        assert_eq!(SqlType::for_type_code('D').as_sql(), "DOUBLE");
        assert_eq!(SqlType::for_type_code('A').as_sql(), "VARCHAR(255)");
        assert_eq!(SqlType::for_type_code('L').as_sql(), "TINYINT(1)");
        assert_eq!(SqlType::for_type_code('C').as_sql(), "TEXT");
        assert_eq!(SqlType::for_type_code('?').as_sql(), "TEXT");
    }

    fn write_sample(path: &Path) {
        BinTableWriter::new()
            .column("source_id", "K")
            .column("ref_epoch", "D")
            .column("phot_g_n_obs", "J")
            .column("astrometric_priors_used", "I")
            .column("phot_g_mean_mag", "E")
            .column("phot_variable_flag", "20A")
            .column("duplicated_source", "L")
            .write_to(path)
            .unwrap();
    }

    #[test]
    fn test_create_table_from_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GaiaSource_000-000-000.fits");
        write_sample(&path);

        let definition = SchemaInference::new(1).infer(&path, "gaia_source").unwrap();

        assert_eq!(
            definition.create_table_sql(),
            "CREATE TABLE `gaia_source` (\n  `source_id` BIGINT,\n  `ref_epoch` DOUBLE,\n  \
             `phot_g_n_obs` BIGINT,\n  `astrometric_priors_used` INT,\n  \
             `phot_g_mean_mag` FLOAT,\n  `phot_variable_flag` VARCHAR(255),\n  \
             `duplicated_source` TINYINT(1)\n);"
        );
    }

    #[test]
    fn test_insert_statement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.fits");
        BinTableWriter::new()
            .column("a", "K")
            .column("b", "D")
            .write_to(&path)
            .unwrap();

        let definition = SchemaInference::new(1).infer(&path, "t").unwrap();
        assert_eq!(
            definition.insert_sql(),
            "INSERT INTO `t` (`a`, `b`) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_missing_table_at_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.fits");
        write_sample(&path);

        let err = SchemaInference::new(2).infer(&path, "t").unwrap_err();
        assert!(matches!(err, SchemaError::MissingTable { index: 2, .. }));
    }

    #[test]
    fn test_unreadable_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.fits");
        std::fs::write(&path, b"not a catalog").unwrap();

        let err = SchemaInference::new(1).infer(&path, "t").unwrap_err();
        assert!(matches!(err, SchemaError::Fits { .. }));
    }

    #[test]
    fn test_sample_is_first_in_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        BinTableWriter::new()
            .column("second", "K")
            .write_to(dir.path().join("b.fits"))
            .unwrap();
        BinTableWriter::new()
            .column("first", "K")
            .write_to(dir.path().join("a.fits"))
            .unwrap();

        let definition = SchemaInference::new(1)
            .infer_from_dir(dir.path(), ".fits", "t")
            .unwrap();
        assert_eq!(definition.columns[0].name, "first");
    }

    #[test]
    fn test_empty_directory_has_no_sample() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchemaInference::new(1)
            .infer_from_dir(dir.path(), ".fits", "t")
            .unwrap_err();
        assert!(matches!(err, SchemaError::NoSampleFile { .. }));
    }

    #[test]
    fn test_quote_identifier_escapes_backticks() {
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_layout_check() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("a.fits");
        let other = dir.path().join("b.fits");
        BinTableWriter::new()
            .column("source_id", "K")
            .column("ra", "D")
            .row(vec![RawValue::Integer(1), RawValue::Float(0.0)])
            .write_to(&expected)
            .unwrap();
        BinTableWriter::new()
            .column("source_id", "K")
            .column("ra", "E")
            .write_to(&other)
            .unwrap();

        let definition = SchemaInference::new(1).infer(&expected, "t").unwrap();
        let same = FitsFile::open(&expected).unwrap().binary_table(1).unwrap();
        let different = FitsFile::open(&other).unwrap().binary_table(1).unwrap();

        assert!(definition.check_layout(&same).is_ok());
        let reason = definition.check_layout(&different).unwrap_err();
        assert!(reason.contains("column 2"));
    }

    #[test]
    fn test_layout_check_compares_repeat_count() {
        let dir = tempfile::tempdir().unwrap();
        let narrow = dir.path().join("a.fits");
        let wide = dir.path().join("b.fits");
        for (path, tform) in [(&narrow, "20A"), (&wide, "30A")] {
            BinTableWriter::new()
                .column("source_id", "K")
                .column("designation", tform)
                .write_to(path)
                .unwrap();
        }

        let definition = SchemaInference::new(1).infer(&narrow, "t").unwrap();
        let table = FitsFile::open(&wide).unwrap().binary_table(1).unwrap();

        let reason = definition.check_layout(&table).unwrap_err();
        assert_eq!(reason, "column 2 is designation (30A), expected designation (20A)");
    }
}
