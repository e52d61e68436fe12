//! Node/edge schema detection and deduplicated `CREATE TABLE ... AS`
//! statement generation (spec §3.3, §4.5 steps 3-5), grounded on
//! `original_source/.../duckdb_manager.py`'s column-name sniff and the
//! teacher's preference (`core/lib/storage`) for building parameterized SQL
//! with a small, explicit builder rather than an ORM.

use graphnode_basic_types::TableName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Node,
    Edge,
    Passthrough,
}

/// Classifies a staging table by its probed column set (spec §3.3: "has
/// `identifier` => node; has both `from` and `to` => edge; otherwise =>
/// passthrough").
pub fn classify(columns: &[String]) -> TableKind {
    let has = |name: &str| columns.iter().any(|c| c.eq_ignore_ascii_case(name));
    if has("identifier") {
        TableKind::Node
    } else if has("from") && has("to") {
        TableKind::Edge
    } else {
        TableKind::Passthrough
    }
}

/// Where the source parquet files come from: a single object-storage glob
/// (parameter-bound) or an explicit list of paths the manager already
/// resolved (inlined as a quoted array, since these came from our own file
/// registry rather than caller input — spec §4.5 step 5).
pub enum StagingSource<'a> {
    Glob(&'a str),
    Files(&'a [String]),
}

impl StagingSource<'_> {
    fn read_parquet_expr(&self) -> (String, Vec<String>) {
        match self {
            StagingSource::Glob(pattern) => (
                "read_parquet(?, hive_partitioning=false)".to_string(),
                vec![pattern.to_string()],
            ),
            StagingSource::Files(paths) => {
                let quoted = paths
                    .iter()
                    .map(|p| format!("'{}'", p.replace('\'', "''")))
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    format!("read_parquet([{quoted}], hive_partitioning=false)"),
                    vec![],
                )
            }
        }
    }
}

/// Builds the `CREATE OR REPLACE TABLE` statement for `table`, along with
/// any bound parameters the glob-source variant needs. `columns` is the
/// probed source schema; `kind` is its [`classify`] result.
pub fn build_create_table_sql(
    table: &TableName,
    kind: TableKind,
    source: &StagingSource,
    columns: &[String],
) -> (String, Vec<String>) {
    let (from_expr, params) = source.read_parquet_expr();
    let quoted = table.quoted();

    let select = match kind {
        TableKind::Node => format!(
            "SELECT * FROM {from_expr} QUALIFY ROW_NUMBER() OVER (PARTITION BY identifier) = 1"
        ),
        TableKind::Edge => {
            let other_cols: Vec<&str> = columns
                .iter()
                .map(String::as_str)
                .filter(|c| !c.eq_ignore_ascii_case("from") && !c.eq_ignore_ascii_case("to"))
                .collect();
            let mut select_list = vec!["\"from\" AS src".to_string(), "\"to\" AS dst".to_string()];
            select_list.extend(other_cols.iter().map(|c| format!("\"{c}\"")));
            format!(
                "SELECT {} FROM {from_expr} QUALIFY ROW_NUMBER() OVER (PARTITION BY \"from\", \"to\") = 1",
                select_list.join(", ")
            )
        }
        TableKind::Passthrough => format!("SELECT * FROM {from_expr}"),
    };

    (format!("CREATE OR REPLACE TABLE {quoted} AS {select}"), params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_node_edge_and_passthrough() {
        assert_eq!(
            classify(&["identifier".into(), "name".into()]),
            TableKind::Node
        );
        assert_eq!(
            classify(&["from".into(), "to".into(), "weight".into()]),
            TableKind::Edge
        );
        assert_eq!(classify(&["a".into(), "b".into()]), TableKind::Passthrough);
    }

    #[test]
    fn edge_select_orders_src_dst_first() {
        let table = TableName::parse("Knows").unwrap();
        let columns = vec!["from".into(), "to".into(), "weight".into()];
        let (sql, _) = build_create_table_sql(
            &table,
            TableKind::Edge,
            &StagingSource::Files(&["a.parquet".into()]),
            &columns,
        );
        assert!(sql.contains("\"from\" AS src, \"to\" AS dst, \"weight\""));
    }

    #[test]
    fn glob_source_parameter_binds_pattern() {
        let table = TableName::parse("Entity").unwrap();
        let (sql, params) = build_create_table_sql(
            &table,
            TableKind::Node,
            &StagingSource::Glob("s3://bucket/*.parquet"),
            &["identifier".into()],
        );
        assert!(sql.contains("read_parquet(?, hive_partitioning=false)"));
        assert_eq!(params, vec!["s3://bucket/*.parquet".to_string()]);
    }
}
