// External crates
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

// Internal imports
use crate::constants::SAMPLE_FILE_EXTENSION;
use crate::error::DatasetError;

/// Read a CSV file with a header row into a DataFrame
///
/// Column types are inferred from every row, so a column of whole numbers
/// that ends in a decimal still parses as floats. Blank lines are dropped
/// and do not count as rows.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
///
/// # Returns
///
/// Returns the parsed DataFrame, or a `DatasetError` naming the file
pub fn read_csv_file<P: AsRef<Path>>(file_path: P) -> Result<DataFrame, DatasetError> {
    let path = file_path.as_ref();
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_error = |source: PolarsError| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(csv_error)?;

    drop_blank_rows(df).map_err(csv_error)
}

/// Remove rows in which every column is null, as produced by empty lines
pub fn drop_blank_rows(df: DataFrame) -> PolarsResult<DataFrame> {
    let columns = df.get_columns();
    let Some(first) = columns.first() else {
        return Ok(df);
    };

    let mut keep = first.is_not_null();
    for column in &columns[1..] {
        keep = &keep | &column.is_not_null();
    }
    if keep.all() {
        return Ok(df);
    }
    df.filter(&keep)
}

/// Find the DataFrame column matching `wanted`, ignoring case and surrounding whitespace
///
/// Sensor exports disagree on header spelling (`x`, `X`, ` x`), so the
/// lookup is lenient about those differences only.
pub fn resolve_column(df: &DataFrame, wanted: &str) -> Option<String> {
    let wanted = wanted.trim().to_lowercase();
    df.get_column_names()
        .into_iter()
        .find(|name| name.trim().to_lowercase() == wanted)
        .map(|name| name.to_string())
}

/// Extract the axis columns as a row-major `[rows, columns]` buffer
///
/// # Arguments
///
/// * `df` - Parsed sample table
/// * `path` - Source file, used for error reporting
/// * `columns` - Axis column names, in feature order
///
/// # Returns
///
/// Returns `rows * columns.len()` values, or an error if a column is missing
/// or holds a null / non-numeric entry
pub fn extract_axis_columns(
    df: &DataFrame,
    path: &Path,
    columns: &[String],
) -> Result<Vec<f32>, DatasetError> {
    let rows = df.height();
    let num_features = columns.len();
    let mut values = vec![0.0f32; rows * num_features];

    for (feature_idx, wanted) in columns.iter().enumerate() {
        let name = resolve_column(df, wanted).ok_or_else(|| DatasetError::MissingColumn {
            path: path.to_path_buf(),
            column: wanted.clone(),
        })?;

        let csv_error = |source: PolarsError| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let column = df
            .column(&name)
            .map_err(csv_error)?
            .cast(&DataType::Float64)
            .map_err(csv_error)?;
        let series = column.f64().map_err(csv_error)?;

        for (row, value) in series.into_iter().enumerate() {
            match value {
                Some(v) if v.is_finite() => values[row * num_features + feature_idx] = v as f32,
                _ => {
                    return Err(DatasetError::InvalidValue {
                        path: path.to_path_buf(),
                        column: wanted.clone(),
                        row,
                    })
                }
            }
        }
    }

    Ok(values)
}

/// List the sample files of a class folder, sorted by path
///
/// Only regular files with the sample extension (case-insensitive) are kept.
/// Sorting makes the load order independent of the platform's directory
/// listing order.
pub fn list_sample_files(folder: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let io_error = |source: std::io::Error| DatasetError::Io {
        path: folder.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let is_sample = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(SAMPLE_FILE_EXTENSION))
            .unwrap_or(false);
        if is_sample && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn axis_columns() -> Vec<String> {
        vec!["x".to_string(), "y".to_string(), "z".to_string()]
    }

    #[test]
    fn test_extract_axis_columns_case_insensitive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        fs::write(&path, "t,X, y ,Z\n0,1.0,2.0,3.0\n1,4.0,5.0,6.0\n").unwrap();

        let df = read_csv_file(&path).unwrap();
        let values = extract_axis_columns(&df, &path, &axis_columns()).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        fs::write(&path, "x,y\n1.0,2.0\n").unwrap();

        let df = read_csv_file(&path).unwrap();
        let err = extract_axis_columns(&df, &path, &axis_columns()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { ref column, .. } if column == "z"));
    }

    #[test]
    fn test_non_numeric_value_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        fs::write(&path, "x,y,z\n1.0,2.0,3.0\n1.0,oops,3.0\n").unwrap();

        let df = read_csv_file(&path).unwrap();
        let err = extract_axis_columns(&df, &path, &axis_columns()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { row: 1, .. }));
    }

    #[test]
    fn test_late_decimal_is_read_as_float() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        let mut text = String::from("x,y,z\n");
        for _ in 0..100 {
            text.push_str("0,1,9\n");
        }
        text.push_str("0.5,1.25,9.75\n");
        fs::write(&path, text).unwrap();

        let df = read_csv_file(&path).unwrap();
        assert_eq!(df.height(), 101);
        let values = extract_axis_columns(&df, &path, &axis_columns()).unwrap();
        assert_eq!(&values[300..], &[0.5, 1.25, 9.75]);
    }

    #[test]
    fn test_blank_lines_are_not_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        fs::write(&path, "x,y,z\n1.0,2.0,3.0\n4.0,5.0,6.0\n\n\n").unwrap();

        let df = read_csv_file(&path).unwrap();
        assert_eq!(df.height(), 2);
        let values = extract_axis_columns(&df, &path, &axis_columns()).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_partially_empty_row_is_kept_and_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        fs::write(&path, "x,y,z\n1.0,2.0,3.0\n1.0,,3.0\n").unwrap();

        let df = read_csv_file(&path).unwrap();
        assert_eq!(df.height(), 2);
        let err = extract_axis_columns(&df, &path, &axis_columns()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { row: 1, .. }));
    }

    #[test]
    fn test_list_sample_files_filters_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "x,y,z\n").unwrap();
        fs::write(dir.path().join("a.CSV"), "x,y,z\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = list_sample_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_csv_file(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }
}
