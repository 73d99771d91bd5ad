//! CSV inputs and outputs: table assignments, FQN lookups, FQN exports.

use crate::error::{Result, TaggerError};
use crate::resolve::is_table_fqn;
use std::collections::HashMap;
use std::path::Path;
use tagsync_catalog_client::CatalogClient;

/// Accepted header names for the table column, compared case-insensitively.
pub const TABLE_COLUMNS: &[&str] = &["table_name", "tablename", "table", "name"];

/// Accepted header names for the application column.
pub const APPLICATION_COLUMNS: &[&str] = &["application", "app", "tag"];

/// Header written on FQN exports.
pub const FQN_HEADER: &str = "fqn";

/// One CSV row: a table and the application it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAssignment {
    pub table: String,
    pub application: String,
}

fn find_column(
    path: &Path,
    headers: &csv::StringRecord,
    wanted: &'static str,
    candidates: &'static [&'static str],
) -> Result<usize> {
    headers
        .iter()
        .position(|h| candidates.contains(&h.trim().to_lowercase().as_str()))
        .ok_or_else(|| TaggerError::MissingColumn {
            path: path.display().to_string(),
            wanted,
            candidates,
            available: headers.iter().map(String::from).collect(),
        })
}

/// Load a table → application CSV.
///
/// Rows with an empty table or application cell are skipped with a warning.
pub fn load_table_assignments(path: impl AsRef<Path>) -> Result<Vec<TableAssignment>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let table_col = find_column(path, &headers, "table", TABLE_COLUMNS)?;
    let app_col = find_column(path, &headers, "application", APPLICATION_COLUMNS)?;
    let (table_header, app_header) = (&headers[table_col], &headers[app_col]);
    tracing::debug!(
        table_column = %table_header,
        application_column = %app_header,
        "Mapped CSV columns"
    );

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let table = record.get(table_col).unwrap_or_default();
        let application = record.get(app_col).unwrap_or_default();
        if table.is_empty() || application.is_empty() {
            // +2: header row and 1-based numbering
            tracing::warn!(path = %path.display(), row = idx + 2, "Skipping incomplete CSV row");
            continue;
        }
        rows.push(TableAssignment {
            table: table.to_string(),
            application: application.to_string(),
        });
    }

    tracing::info!(path = %path.display(), rows = rows.len(), "Loaded table assignments");
    Ok(rows)
}

/// Group tables by application, applications in first-seen order.
pub fn group_by_application(rows: &[TableAssignment]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.application.as_str()).or_insert_with(|| {
            groups.push((row.application.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row.table.clone());
    }
    groups
}

/// Read an exported FQN list: header row, FQN in the first column.
///
/// Only 4-part table FQNs are returned.
pub fn load_fqn_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut fqns = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        match record.get(0) {
            Some(fqn) if is_table_fqn(fqn) => fqns.push(fqn.to_string()),
            _ => skipped += 1,
        }
    }

    tracing::info!(path = %path.display(), fqns = fqns.len(), skipped, "Loaded FQN list");
    Ok(fqns)
}

/// Write FQNs as a one-column CSV with header `fqn`.
pub fn write_fqn_csv<I, S>(path: impl AsRef<Path>, fqns: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TaggerError::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([FQN_HEADER])?;
    let mut written = 0usize;
    for fqn in fqns {
        writer.write_record([fqn.as_ref()])?;
        written += 1;
    }
    writer.flush().map_err(|e| TaggerError::io(path, e))?;

    tracing::info!(path = %path.display(), fqns = written, "Wrote FQN export");
    Ok(written)
}

/// List every table in the catalog and write the FQNs to `path`.
pub async fn export_table_fqns(
    client: &CatalogClient,
    path: impl AsRef<Path>,
    page_size: usize,
) -> Result<usize> {
    let fqns = client.list_table_fqns(page_size).await?;
    write_fqn_csv(path, &fqns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_column_variations_case_insensitive() {
        let file = csv_file("Owner,TableName,APP\njdoe,ORDERS,FTA\njdoe,INVOICES,FTA\n");
        let rows = load_table_assignments(file.path()).unwrap();

        assert_eq!(
            rows,
            vec![
                TableAssignment {
                    table: "ORDERS".into(),
                    application: "FTA".into()
                },
                TableAssignment {
                    table: "INVOICES".into(),
                    application: "FTA".into()
                },
            ]
        );
    }

    #[test]
    fn test_missing_column_lists_available() {
        let file = csv_file("table_name,owner\nORDERS,jdoe\n");
        match load_table_assignments(file.path()).unwrap_err() {
            TaggerError::MissingColumn {
                wanted, available, ..
            } => {
                assert_eq!(wanted, "application");
                assert_eq!(available, vec!["table_name", "owner"]);
            }
            other => panic!("Expected MissingColumn, got: {:?}", other),
        }
    }

    #[test]
    fn test_incomplete_rows_skipped() {
        let file = csv_file("table,tag\nORDERS,FTA\n,FTA\nCUSTOMERS,\n");
        let rows = load_table_assignments(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_group_by_application_first_seen_order() {
        let rows: Vec<TableAssignment> = [("A", "FTA"), ("B", "ATS"), ("C", "FTA")]
            .iter()
            .map(|(t, a)| TableAssignment {
                table: t.to_string(),
                application: a.to_string(),
            })
            .collect();

        let groups = group_by_application(&rows);
        assert_eq!(
            groups,
            vec![
                ("FTA".to_string(), vec!["A".to_string(), "C".to_string()]),
                ("ATS".to_string(), vec!["B".to_string()]),
            ]
        );
    }

    #[test]
    fn test_fqn_export_then_lookup_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openmetadata_table_fqns.csv");

        let written =
            write_fqn_csv(&path, ["SVC.DB.SCHEMA.ORDERS", "SVC.DB.SCHEMA", "SVC.DB.S2.X"]).unwrap();
        assert_eq!(written, 3);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("fqn\n"));

        let fqns = load_fqn_list(&path).unwrap();
        assert_eq!(fqns, vec!["SVC.DB.SCHEMA.ORDERS", "SVC.DB.S2.X"]);
    }

    #[test]
    fn test_missing_csv_file() {
        assert!(matches!(
            load_fqn_list("/nonexistent/fqns.csv"),
            Err(TaggerError::Csv(_))
        ));
    }
}
