//! Assembles the final [`RoutineMetadata`] from the pipeline's outputs.

use std::collections::BTreeMap;

use crate::directives::Directives;
use crate::docblock::DocBlock;
use crate::metadata::{RoutineMetadata, RoutineParameter, WrapperDocBlock, WrapperParameter};
use crate::placeholder::{MAGIC_DIR, MAGIC_FILE, MAGIC_LINE, MAGIC_ROUTINE};
use crate::reconcile::BulkInsertColumns;
use crate::signature::Signature;

/// Everything the metadata record is built from.
pub struct AssemblyInput<'a> {
    pub signature: &'a Signature,
    pub directives: &'a Directives,
    pub parameters: Vec<RoutineParameter>,
    pub bulk_insert: Option<BulkInsertColumns>,
    pub doc: &'a DocBlock,
    pub timestamp: i64,
    pub replace: &'a BTreeMap<String, String>,
}

pub fn assemble(input: AssemblyInput<'_>) -> RoutineMetadata {
    let designation = &input.directives.designation;

    let replace = input
        .replace
        .iter()
        .filter(|(k, _)| ![MAGIC_FILE, MAGIC_ROUTINE, MAGIC_DIR, MAGIC_LINE].contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let docblock = WrapperDocBlock {
        short_description: input.doc.short_description.clone(),
        long_description: input.doc.long_description.clone(),
        parameters: input
            .parameters
            .iter()
            .map(|p| WrapperParameter {
                parameter_name: p.parameter_name.clone(),
                value_kind: value_kind(&p.data_type).to_string(),
                data_type_descriptor: p.data_type_descriptor.clone(),
                description: input
                    .doc
                    .parameter_description(&p.parameter_name)
                    .map(str::to_string),
            })
            .collect(),
    };

    let (fields, column_types) = match input.bulk_insert {
        Some(bulk) => (Some(bulk.fields), Some(bulk.column_types)),
        None => (None, None),
    };

    RoutineMetadata {
        routine_name: input.signature.name.clone(),
        routine_kind: input.signature.kind,
        designation: designation.kind().to_string(),
        return_type: input.directives.return_type.clone(),
        table_name: designation.table_name().map(str::to_string),
        parameters: input.parameters,
        columns: designation.columns().map(<[String]>::to_vec),
        fields,
        column_types,
        timestamp: input.timestamp,
        replace,
        docblock,
        extended_params: input.directives.extended_params.clone(),
    }
}

/// Maps a MySQL data type to the scalar kind a wrapper passes or receives.
pub fn value_kind(data_type: &str) -> &'static str {
    match data_type.to_ascii_lowercase().as_str() {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "year" | "bit" => {
            "int"
        }
        "decimal" | "numeric" | "float" | "double" | "real" => "float",
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "binary"
        | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "date" | "datetime"
        | "timestamp" | "time" | "enum" | "set" | "json" => "string",
        _ => "mixed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::{DesignationType, ExtendedParam};
    use crate::docblock::DocParameter;
    use crate::models::RoutineKind;

    fn signature() -> Signature {
        Signature {
            kind: RoutineKind::Procedure,
            name: "abc_order_load".to_string(),
        }
    }

    #[test]
    fn test_assemble_bulk_insert() {
        let directives = Directives {
            designation: DesignationType::BulkInsert {
                table_name: "tmp_order".to_string(),
                columns: vec!["id".to_string(), "tags".to_string()],
            },
            return_type: None,
            extended_params: vec![ExtendedParam {
                name: "p_tags".to_string(),
                data_type: "csv".to_string(),
                delimiter: ',',
                enclosure: '"',
                escape: '\\',
            }],
        };
        let parameters = vec![RoutineParameter {
            parameter_name: "p_tags".to_string(),
            data_type: "text".to_string(),
            dtd_identifier: "text".to_string(),
            character_set_name: Some("utf8mb4".to_string()),
            collation_name: None,
            data_type_descriptor: "text character set utf8mb4".to_string(),
            format: Some(directives.extended_params[0].clone()),
        }];
        let doc = DocBlock {
            short_description: "Loads orders.".to_string(),
            long_description: String::new(),
            parameters: vec![DocParameter {
                name: "p_tags".to_string(),
                description: "The tags.".to_string(),
            }],
        };
        let mut replace = BTreeMap::new();
        replace.insert("@MAX@".to_string(), "10".to_string());
        replace.insert("__LINE__".to_string(), "3".to_string());

        let metadata = assemble(AssemblyInput {
            signature: &signature(),
            directives: &directives,
            parameters,
            bulk_insert: Some(BulkInsertColumns {
                fields: vec!["ord_id".to_string(), "ord_tags".to_string()],
                column_types: vec!["int".to_string(), "varchar".to_string()],
            }),
            doc: &doc,
            timestamp: 1_700_000_000,
            replace: &replace,
        });

        assert_eq!(metadata.routine_name, "abc_order_load");
        assert_eq!(metadata.designation, "bulk_insert");
        assert_eq!(metadata.table_name.as_deref(), Some("tmp_order"));
        assert_eq!(metadata.columns, Some(vec!["id".to_string(), "tags".to_string()]));
        assert_eq!(metadata.fields, Some(vec!["ord_id".to_string(), "ord_tags".to_string()]));
        assert_eq!(metadata.timestamp, 1_700_000_000);
        assert_eq!(metadata.replace.len(), 1);
        assert!(metadata.replace.contains_key("@MAX@"));
        assert_eq!(metadata.docblock.parameters[0].value_kind, "string");
        assert_eq!(
            metadata.docblock.parameters[0].description.as_deref(),
            Some("The tags.")
        );
        assert_eq!(metadata.extended_params.len(), 1);
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(value_kind("INT"), "int");
        assert_eq!(value_kind("decimal"), "float");
        assert_eq!(value_kind("varchar"), "string");
        assert_eq!(value_kind("geometry"), "mixed");
    }
}
