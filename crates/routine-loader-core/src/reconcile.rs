//! Reconciles a freshly loaded routine with the database catalog.
//!
//! After loading, the catalog is the authority on parameter names and
//! types. This module reads them back, merges in the list formats of
//! `-- param:` directives, resolves the table of bulk insert routines, and
//! checks the routine's documentation against the catalog.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::database::RoutineDatabase;
use crate::directives::{DesignationType, ExtendedParam};
use crate::docblock::DocBlock;
use crate::error::{LoaderError, LoaderResult};
use crate::metadata::RoutineParameter;
use crate::models::CatalogParameter;

/// Column names and base types of the table a bulk insert routine fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkInsertColumns {
    pub fields: Vec<String>,
    pub column_types: Vec<String>,
}

/// Resolves the table of a `bulk_insert` routine; `None` for other designations.
///
/// A table that does not exist as a regular table is assumed to be a
/// temporary table created by the routine itself: the routine is called
/// once, the table described, and the temporary table dropped again.
pub async fn resolve_bulk_insert_columns<D: RoutineDatabase + ?Sized>(
    db: &D,
    routine: &str,
    designation: &DesignationType,
) -> LoaderResult<Option<BulkInsertColumns>> {
    let DesignationType::BulkInsert {
        table_name,
        columns: directive_columns,
    } = designation
    else {
        return Ok(None);
    };

    let is_permanent = db
        .table_exists(table_name)
        .await
        .map_err(|e| LoaderError::load_failed(routine, e))?;

    if !is_permanent {
        debug!(routine, table = %table_name, "calling routine to create temporary table");
        db.call_routine(routine)
            .await
            .map_err(|e| LoaderError::load_failed(routine, e))?;
    }

    let described = db.describe_table(table_name).await;

    // The temporary table must not outlive this routine in the shared session.
    if !is_permanent {
        let dropped = db.drop_temporary_table(table_name).await;
        match (&described, dropped) {
            (Ok(_), Err(e)) => return Err(LoaderError::load_failed(routine, e)),
            (Err(_), Err(e)) => {
                warn!(routine, table = %table_name, "Unable to drop temporary table: {}", e)
            }
            (_, Ok(())) => {}
        }
    }

    let columns = described.map_err(|e| LoaderError::load_failed(routine, e))?;

    if directive_columns.len() != columns.len() {
        return Err(LoaderError::ColumnCountMismatch {
            table: table_name.clone(),
            expected: directive_columns.len(),
            actual: columns.len(),
        });
    }

    Ok(Some(BulkInsertColumns {
        fields: columns.iter().map(|c| c.field.clone()).collect(),
        column_types: columns.iter().map(|c| c.base_type()).collect(),
    }))
}

/// Reads the routine's parameters from the catalog and merges `extended`.
pub async fn resolve_parameters<D: RoutineDatabase + ?Sized>(
    db: &D,
    routine: &str,
    extended: &[ExtendedParam],
) -> LoaderResult<Vec<RoutineParameter>> {
    let catalog = db
        .routine_parameters(routine)
        .await
        .map_err(|e| LoaderError::load_failed(routine, e))?;

    merge_parameters(catalog, extended)
}

/// Drops unnamed catalog entries and attaches each directive's list format
/// to the parameter of the same name.
pub fn merge_parameters(
    catalog: Vec<CatalogParameter>,
    extended: &[ExtendedParam],
) -> LoaderResult<Vec<RoutineParameter>> {
    let mut parameters: Vec<RoutineParameter> = catalog
        .into_iter()
        .filter_map(|p| {
            let name = p.parameter_name.clone().filter(|n| !n.is_empty())?;
            Some(RoutineParameter {
                data_type_descriptor: p.data_type_descriptor(),
                parameter_name: name,
                data_type: p.data_type,
                dtd_identifier: p.dtd_identifier,
                character_set_name: p.character_set_name,
                collation_name: p.collation_name,
                format: None,
            })
        })
        .collect();

    for directive in extended {
        let parameter = parameters
            .iter_mut()
            .find(|p| p.parameter_name == directive.name)
            .ok_or_else(|| LoaderError::UnknownExtendedParameter {
                name: directive.name.clone(),
            })?;
        parameter.format = Some(directive.clone());
    }

    Ok(parameters)
}

/// Parameters present in the catalog but not documented, and documented
/// parameters unknown to the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterDocReport {
    pub undocumented: Vec<String>,
    pub unknown: Vec<String>,
}

impl ParameterDocReport {
    pub fn is_clean(&self) -> bool {
        self.undocumented.is_empty() && self.unknown.is_empty()
    }
}

/// Compares catalog parameters with the doc-block. Findings are logged as
/// warnings and returned; they never fail the load.
pub fn validate_parameter_docs(
    routine: &str,
    parameters: &[RoutineParameter],
    doc: &DocBlock,
) -> ParameterDocReport {
    let documented: BTreeSet<&str> = doc.parameters.iter().map(|p| p.name.as_str()).collect();
    let declared: BTreeSet<&str> = parameters.iter().map(|p| p.parameter_name.as_str()).collect();

    let undocumented: Vec<String> = parameters
        .iter()
        .map(|p| p.parameter_name.as_str())
        .filter(|name| !documented.contains(name))
        .map(str::to_string)
        .collect();
    let unknown: Vec<String> = doc
        .parameters
        .iter()
        .map(|p| p.name.as_str())
        .filter(|name| !declared.contains(name))
        .map(str::to_string)
        .collect();

    for name in &undocumented {
        warn!(routine, "Parameter {} is missing from doc block", name);
    }
    for name in &unknown {
        warn!(routine, "Unknown parameter {} found in doc block", name);
    }

    ParameterDocReport {
        undocumented,
        unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::InMemoryDatabase;
    use crate::docblock::DocParameter;
    use crate::models::TableColumn;

    fn csv(name: &str) -> ExtendedParam {
        ExtendedParam {
            name: name.to_string(),
            data_type: "csv".to_string(),
            delimiter: ',',
            enclosure: '"',
            escape: '\\',
        }
    }

    fn return_value() -> CatalogParameter {
        CatalogParameter {
            parameter_name: None,
            data_type: "int".to_string(),
            dtd_identifier: "int(11)".to_string(),
            character_set_name: None,
            collation_name: None,
        }
    }

    #[test]
    fn test_merge_extended_param() {
        let catalog = vec![
            CatalogParameter::new("p_id", "int(11)"),
            CatalogParameter::new("tags", "text"),
        ];
        let params = merge_parameters(catalog, &[csv("tags")]).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].format, None);
        let format = params[1].format.as_ref().unwrap();
        assert_eq!(format.delimiter, ',');
        assert_eq!(format.enclosure, '"');
        assert_eq!(format.escape, '\\');
    }

    #[test]
    fn test_merge_unknown_extended_param() {
        let catalog = vec![CatalogParameter::new("p_id", "int(11)")];
        let err = merge_parameters(catalog, &[csv("tags")]).unwrap_err();
        assert!(matches!(err, LoaderError::UnknownExtendedParameter { ref name } if name == "tags"));
    }

    #[test]
    fn test_merge_skips_return_value() {
        let catalog = vec![return_value(), CatalogParameter::new("p_a", "int(11)")];
        let params = merge_parameters(catalog, &[]).unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].parameter_name, "p_a");
        assert_eq!(params[0].data_type_descriptor, "int(11)");
    }

    #[test]
    fn test_validate_parameter_docs() {
        let params = merge_parameters(
            vec![
                CatalogParameter::new("p_a", "int(11)"),
                CatalogParameter::new("p_b", "int(11)"),
            ],
            &[],
        )
        .unwrap();
        let doc = DocBlock {
            parameters: vec![
                DocParameter {
                    name: "p_a".to_string(),
                    description: "A.".to_string(),
                },
                DocParameter {
                    name: "p_c".to_string(),
                    description: "C.".to_string(),
                },
            ],
            ..Default::default()
        };
        let report = validate_parameter_docs("abc", &params, &doc);
        assert_eq!(report.undocumented, vec!["p_b"]);
        assert_eq!(report.unknown, vec!["p_c"]);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_bulk_insert_temporary_table() {
        let db = InMemoryDatabase::new().with_temporary_table_on_call(
            "abc_order_load",
            "tmp_order",
            vec![
                TableColumn::new("ord_id", "int(10) unsigned"),
                TableColumn::new("ord_note", "varchar(80)"),
            ],
        );
        db.execute("create procedure abc_order_load()\nbegin\nend")
            .await
            .unwrap();

        let designation = DesignationType::BulkInsert {
            table_name: "tmp_order".to_string(),
            columns: vec!["id".to_string(), "note".to_string()],
        };
        let columns = resolve_bulk_insert_columns(&db, "abc_order_load", &designation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(columns.fields, vec!["ord_id", "ord_note"]);
        assert_eq!(columns.column_types, vec!["int", "varchar"]);
        assert_eq!(db.calls(), vec!["abc_order_load"]);
        assert!(!db.has_temporary_table("tmp_order"));
    }

    #[tokio::test]
    async fn test_temporary_table_dropped_when_describe_fails() {
        let db = InMemoryDatabase::new()
            .with_temporary_table_on_call(
                "abc_order_load",
                "tmp_order",
                vec![TableColumn::new("ord_id", "int(11)")],
            )
            .with_failing_statement("show columns from tmp_order");
        db.execute("create procedure abc_order_load()\nbegin\nend")
            .await
            .unwrap();

        let designation = DesignationType::BulkInsert {
            table_name: "tmp_order".to_string(),
            columns: vec!["id".to_string()],
        };
        let err = resolve_bulk_insert_columns(&db, "abc_order_load", &designation)
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::LoadFailed { ref routine, .. } if routine == "abc_order_load"));
        assert!(!db.has_temporary_table("tmp_order"));
        assert!(db
            .statements()
            .iter()
            .any(|s| s == "drop temporary table tmp_order"));
    }

    #[tokio::test]
    async fn test_bulk_insert_permanent_table_is_not_called() {
        let db = InMemoryDatabase::new()
            .with_table("orders", vec![TableColumn::new("ord_id", "int(11)")]);
        let designation = DesignationType::BulkInsert {
            table_name: "orders".to_string(),
            columns: vec!["id".to_string()],
        };
        let columns = resolve_bulk_insert_columns(&db, "abc_order_load", &designation)
            .await
            .unwrap();
        assert!(columns.is_some());
        assert!(db.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_insert_column_count_mismatch() {
        let db = InMemoryDatabase::new()
            .with_table("orders", vec![TableColumn::new("ord_id", "int(11)")]);
        let designation = DesignationType::BulkInsert {
            table_name: "orders".to_string(),
            columns: vec!["id".to_string(), "extra".to_string()],
        };
        let err = resolve_bulk_insert_columns(&db, "abc_order_load", &designation)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoaderError::ColumnCountMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_non_bulk_insert_is_skipped() {
        let db = InMemoryDatabase::new();
        let designation = DesignationType::Plain("rows".to_string());
        assert_eq!(
            resolve_bulk_insert_columns(&db, "abc", &designation).await.unwrap(),
            None
        );
    }
}
