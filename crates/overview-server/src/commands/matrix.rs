use clap::Args;
use comfy_table::{Cell, Table};
use overview::{FetchStatus, MatrixCell, OverviewMatrix};
use shared::error::CommonError;

use super::{WorkspaceArgs, load_overview};

const ABSENT: &str = "-";
const DECRYPTION_FAILED: &str = "!";
const UNKNOWN: &str = "?";

#[derive(Args, Debug, Clone)]
pub struct MatrixParams {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Only show secrets and folders whose name contains this text
    #[arg(long, default_value = "")]
    pub filter: String,
}

pub async fn cmd_matrix(params: MatrixParams) -> Result<(), CommonError> {
    let service = load_overview(&params.workspace).await?;
    service.wait_until_loaded().await;
    let matrix = service.matrix(&params.filter).await;

    println!("Path: {}", matrix.secret_path);
    if matrix.key_unavailable {
        println!("Workspace key unavailable, secret values are hidden.");
    }

    if matrix.rows.is_empty() && matrix.folder_rows.is_empty() {
        println!("No secrets or folders found.");
        return Ok(());
    }

    println!("{}", render_table(&matrix));
    Ok(())
}

fn column_header(matrix: &OverviewMatrix, pos: usize) -> String {
    let column = &matrix.environments[pos];
    match (&column.secrets, column.missing_count) {
        (FetchStatus::Failed { .. }, _) => format!("{} (unavailable)", column.name),
        (_, Some(0)) => column.name.clone(),
        (_, Some(missing)) => format!("{} ({missing} missing)", column.name),
        (_, None) => column.name.clone(),
    }
}

fn render_cell(cell: &MatrixCell) -> String {
    match cell {
        MatrixCell::Present { value, .. } => value.clone(),
        MatrixCell::Missing => ABSENT.to_string(),
        MatrixCell::DecryptionFailed { .. } => DECRYPTION_FAILED.to_string(),
        MatrixCell::Unknown => UNKNOWN.to_string(),
    }
}

/// Folders first, then one row per secret key; one column per environment
pub fn render_table(matrix: &OverviewMatrix) -> Table {
    let mut table = Table::new();
    let mut header = vec![Cell::new("Name")];
    header.extend((0..matrix.environments.len()).map(|pos| Cell::new(column_header(matrix, pos))));
    table.set_header(header);

    for folder in &matrix.folder_rows {
        let mut row = vec![Cell::new(format!("{}/", folder.name))];
        row.extend(matrix.environments.iter().map(|env| {
            let present = folder.present_in.contains(&env.slug);
            Cell::new(if present { "+" } else { ABSENT })
        }));
        table.add_row(row);
    }

    for secret in &matrix.rows {
        let mut row = vec![Cell::new(&secret.key)];
        row.extend(secret.cells.iter().map(|cell| Cell::new(render_cell(cell))));
        table.add_row(row);
    }

    table
}

#[cfg(test)]
mod tests {
    mod unit {
        use std::collections::BTreeMap;

        use overview::logic::matrix::{EnvironmentColumnView, FolderRow, SecretRow};

        use super::super::*;

        fn column(slug: &str, missing_count: Option<usize>) -> EnvironmentColumnView {
            EnvironmentColumnView {
                slug: slug.to_string(),
                name: slug.to_uppercase(),
                secrets: FetchStatus::Resolved,
                folders: FetchStatus::Resolved,
                missing_count,
            }
        }

        #[test]
        fn test_render_marks_absent_and_failed_cells() {
            let matrix = OverviewMatrix {
                secret_path: "/".to_string(),
                keys: vec!["A".to_string()],
                folders: vec!["backend".to_string()],
                rows: vec![SecretRow {
                    key: "A".to_string(),
                    cells: vec![
                        MatrixCell::Present {
                            value: "v".to_string(),
                            comment: String::new(),
                        },
                        MatrixCell::Missing,
                        MatrixCell::DecryptionFailed {
                            reason: "bad".to_string(),
                        },
                    ],
                }],
                folder_rows: vec![FolderRow {
                    name: "backend".to_string(),
                    present_in: vec!["dev".to_string()],
                }],
                environments: vec![
                    column("dev", Some(0)),
                    column("staging", Some(1)),
                    column("prod", Some(0)),
                ],
                per_environment_missing_count: BTreeMap::new(),
                loading: false,
                key_unavailable: false,
            };

            let rendered = render_table(&matrix).to_string();
            assert!(rendered.contains("STAGING (1 missing)"));
            assert!(rendered.contains("backend/"));
            assert!(rendered.contains(" ! "));
            assert!(rendered.contains(" - "));
        }
    }
}
