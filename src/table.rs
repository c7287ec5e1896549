//! Aligned tables (Arrow `RecordBatch` backed) and their CSV form
//!
//! Every intermediate artifact of the pipeline is one of these tables: the
//! aligned per-run CSVs, the merged sequential/parallel CSVs and the
//! preprocessing timeline. Tables are append-only in the column direction:
//! [`Table::merge_column`] returns a new table, it never mutates rows.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array};
use arrow::compute::{cast, concat_batches};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;

use crate::{Error, Result};

/// Header of the positional key column of every aligned table.
pub const REPETITION_COLUMN: &str = "Repetition";

/// A single in-memory table with named columns.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Wrap an existing record batch.
    #[must_use]
    pub const fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Build a table with a leading `Repetition` column followed by `f64` columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RowCountMismatch`] if a value column is not as long
    /// as the repetition column.
    pub fn with_repetitions(repetitions: &[u32], columns: Vec<(&str, Vec<f64>)>) -> Result<Self> {
        let mut fields = vec![Field::new(REPETITION_COLUMN, DataType::Int64, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from_iter_values(
            repetitions.iter().map(|&r| i64::from(r)),
        ))];

        for (name, values) in columns {
            if values.len() != repetitions.len() {
                return Err(Error::RowCountMismatch {
                    left: repetitions.len(),
                    right: values.len(),
                });
            }
            fields.push(Field::new(name, DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(values)));
        }

        Ok(Self::new(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?))
    }

    /// Build a table of `f64` columns without a repetition key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RowCountMismatch`] if the columns differ in length.
    pub fn from_f64_columns(columns: Vec<(&str, Vec<f64>)>) -> Result<Self> {
        let expected = columns.first().map_or(0, |(_, values)| values.len());
        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

        for (name, values) in columns {
            if values.len() != expected {
                return Err(Error::RowCountMismatch {
                    left: expected,
                    right: values.len(),
                });
            }
            fields.push(Field::new(name, DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(values)));
        }

        Ok(Self::new(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?))
    }

    /// Load a table from a CSV file with a header row.
    ///
    /// Column types are inferred from the data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyInput`] if the file has no data rows, and an IO
    /// or Arrow error if it cannot be read or parsed.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::EmptyInput(path.to_path_buf()));
        }

        let (schema, _) = Format::default()
            .with_header(true)
            .infer_schema(&mut file, None)?;
        file.seek(SeekFrom::Start(0))?;

        let schema = Arc::new(schema);
        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_header(true)
            .build(file)?;

        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        let batch = concat_batches(&schema, &batches)?;
        if batch.num_rows() == 0 {
            return Err(Error::EmptyInput(path.to_path_buf()));
        }

        tracing::debug!(path = %path.display(), rows = batch.num_rows(), "loaded table");
        Ok(Self::new(batch))
    }

    /// Write the table as CSV with a header row, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an IO or Arrow error if the file cannot be written.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(&self.batch)?;

        tracing::info!(path = %path.display(), rows = self.num_rows(), "wrote table");
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Look up a column by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] if no column has that name.
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Read a numeric column as `f64` values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] if the column is absent and
    /// [`Error::Format`] if it is not numeric or contains nulls.
    pub fn f64_column(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name)?;
        if column.null_count() > 0 {
            return Err(Error::Format(format!("column {name} contains empty cells")));
        }
        if !column.data_type().is_numeric() {
            return Err(Error::Format(format!(
                "column {name} is {}, expected numbers",
                column.data_type()
            )));
        }

        let values = cast(column, &DataType::Float64)?;
        Ok(values.as_primitive::<Float64Type>().values().to_vec())
    }

    /// Keep only `columns`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] for the first absent column.
    pub fn select(&self, columns: &[&str]) -> Result<Self> {
        let schema = self.batch.schema();
        let indices = columns
            .iter()
            .map(|name| {
                schema
                    .index_of(name)
                    .map_err(|_| Error::MissingColumn((*name).to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(self.batch.project(&indices)?))
    }

    /// Return a copy of the table with one column renamed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] if `from` does not exist.
    pub fn rename_column(&self, from: &str, to: &str) -> Result<Self> {
        let schema = self.batch.schema();
        let index = schema
            .index_of(from)
            .map_err(|_| Error::MissingColumn(from.to_string()))?;

        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if i == index {
                    f.as_ref().clone().with_name(to)
                } else {
                    f.as_ref().clone()
                }
            })
            .collect();

        Ok(Self::new(RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            self.batch.columns().to_vec(),
        )?))
    }

    /// Append `column` of `other` to this table under the name `as_name`.
    ///
    /// Rows are matched by position, not by repetition id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RowCountMismatch`] if the tables differ in length
    /// (nothing is merged), or [`Error::MissingColumn`] if `other` lacks
    /// `column`.
    ///
    /// # Example
    ///
    /// ```
    /// use perflog::table::Table;
    ///
    /// # fn main() -> perflog::Result<()> {
    /// let seq = Table::with_repetitions(
    ///     &[1, 2],
    ///     vec![("Execution_Time_Sequential_ms", vec![10.0, 11.0])],
    /// )?;
    /// let par = Table::with_repetitions(&[1, 2], vec![("Execution_Time_ms", vec![4.0, 5.0])])?;
    /// let merged = seq.merge_column(&par, "Execution_Time_ms", "Execution_Time_Parallel_ms")?;
    /// assert_eq!(merged.f64_column("Execution_Time_Parallel_ms")?, vec![4.0, 5.0]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn merge_column(&self, other: &Self, column: &str, as_name: &str) -> Result<Self> {
        if self.num_rows() != other.num_rows() {
            return Err(Error::RowCountMismatch {
                left: self.num_rows(),
                right: other.num_rows(),
            });
        }

        let appended = Arc::clone(other.column(column)?);
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        fields.push(Field::new(as_name, appended.data_type().clone(), appended.null_count() > 0));

        let mut columns = self.batch.columns().to_vec();
        columns.push(appended);

        Ok(Self::new(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn table(rows: u32, column: &str) -> Table {
        let reps: Vec<u32> = (1..=rows).collect();
        let values = reps.iter().map(|&r| f64::from(r) * 1.5).collect();
        Table::with_repetitions(&reps, vec![(column, values)]).unwrap()
    }

    #[test]
    fn test_merge_equal_lengths() {
        let seq = table(5, "RAM_Usage_Sequential_MB");
        let par = table(5, "RAM_Usage_End_MB");
        let merged = seq
            .merge_column(&par, "RAM_Usage_End_MB", "RAM_Usage_Parallel_MB")
            .unwrap();

        assert_eq!(merged.num_rows(), 5);
        assert_eq!(
            merged.column_names(),
            vec!["Repetition", "RAM_Usage_Sequential_MB", "RAM_Usage_Parallel_MB"]
        );
    }

    #[test]
    fn test_merge_row_count_mismatch() {
        let seq = table(5, "a");
        let par = table(4, "a");
        match seq.merge_column(&par, "a", "b") {
            Err(Error::RowCountMismatch { left, right }) => {
                assert_eq!(left, 5);
                assert_eq!(right, 4);
            }
            other => panic!("expected RowCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_missing_column() {
        let seq = table(2, "a");
        let par = table(2, "a");
        assert!(matches!(
            seq.merge_column(&par, "nope", "b"),
            Err(Error::MissingColumn(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_rename_column() {
        let t = table(2, "a").rename_column("a", "b").unwrap();
        assert_eq!(t.column_names(), vec!["Repetition", "b"]);
        assert!(t.rename_column("a", "c").is_err());
    }

    #[test]
    fn test_select() {
        let t = Table::with_repetitions(&[1], vec![("a", vec![1.0]), ("b", vec![2.0])]).unwrap();
        assert_eq!(t.select(&["b", "Repetition"]).unwrap().column_names(), vec!["b", "Repetition"]);
        assert!(matches!(t.select(&["c"]), Err(Error::MissingColumn(_))));
    }

    #[test]
    fn test_f64_column_casts_integers() {
        let t = table(3, "v");
        assert_eq!(t.f64_column(REPETITION_COLUMN).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_with_repetitions_length_check() {
        assert!(matches!(
            Table::with_repetitions(&[1, 2], vec![("v", vec![1.0])]),
            Err(Error::RowCountMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn test_csv_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("t.csv");
        let t = Table::with_repetitions(
            &[1, 2, 3],
            vec![("Execution_Time_ms", vec![1500.0, 2500.5, 62500.0])],
        )
        .unwrap();
        t.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Repetition,Execution_Time_ms"));

        let loaded = Table::read_csv(&path).unwrap();
        assert_eq!(loaded.num_rows(), 3);
        assert_eq!(loaded.f64_column("Execution_Time_ms").unwrap(), vec![1500.0, 2500.5, 62500.0]);
    }

    #[test]
    fn test_read_csv_header_only_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "Repetition,Max_CPU_Usage_us\n").unwrap();
        assert!(matches!(Table::read_csv(&path), Err(Error::EmptyInput(_))));

        std::fs::write(&path, "").unwrap();
        assert!(matches!(Table::read_csv(&path), Err(Error::EmptyInput(_))));
    }
}
