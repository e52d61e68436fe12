//! Schema DDL generation for new graph databases (spec §4.4 step 3),
//! grounded on `original_source/.../schema/` catalog loading (node/edge
//! type catalog keyed by repository) and the teacher's migration-style DDL
//! emission in `core/lib/storage/src/chain/account/mod.rs` (string-built SQL
//! against a fixed column set, executed statement-by-statement).

use graphnode_basic_types::{Error, TableName};

/// Declared property types in the in-process schema catalog, mapped to the
/// graph engine's column types (spec §4.4: "fixed table ... defaulting to
/// STRING").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Int64,
    Int32,
    Double,
    Float,
    Boolean,
    Timestamp,
    Date,
    Blob,
}

impl PropertyType {
    pub fn engine_type(self) -> &'static str {
        match self {
            PropertyType::String => "STRING",
            PropertyType::Int64 => "INT64",
            PropertyType::Int32 => "INT32",
            PropertyType::Double => "DOUBLE",
            PropertyType::Float => "FLOAT",
            PropertyType::Boolean => "BOOLEAN",
            PropertyType::Timestamp => "TIMESTAMP",
            PropertyType::Date => "DATE",
            PropertyType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub property_type: PropertyType,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeTypeDef {
    pub name: String,
    pub properties: Vec<PropertyDef>,
    pub primary_key: String,
}

#[derive(Debug, Clone)]
pub struct RelationshipTypeDef {
    pub name: String,
    pub from: String,
    pub to: String,
    pub properties: Vec<PropertyDef>,
}

/// The in-process schema catalog: every node/relationship type the `entity`
/// schema knows about, plus the named extension subsets `shared` schemas
/// restrict themselves to (spec §4.4: "SEC = base + ledger extension
/// only").
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    pub nodes: Vec<NodeTypeDef>,
    pub relationships: Vec<RelationshipTypeDef>,
}

impl SchemaCatalog {
    /// The base catalog every graph gets: an `Entity` node and a `Note`
    /// node connected by a `References` relationship. Kept deliberately
    /// small; a production catalog would be loaded from a schema registry
    /// collaborator, which is out of scope here (spec Non-goals: no
    /// tenant/billing-plan model).
    pub fn base() -> Self {
        Self {
            nodes: vec![
                NodeTypeDef {
                    name: "Entity".into(),
                    properties: vec![
                        PropertyDef::new("identifier", PropertyType::String),
                        PropertyDef::new("name", PropertyType::String),
                        PropertyDef::new("created_at", PropertyType::Timestamp),
                    ],
                    primary_key: "identifier".into(),
                },
                NodeTypeDef {
                    name: "Note".into(),
                    properties: vec![
                        PropertyDef::new("identifier", PropertyType::String),
                        PropertyDef::new("body", PropertyType::String),
                    ],
                    primary_key: "identifier".into(),
                },
            ],
            relationships: vec![RelationshipTypeDef {
                name: "References".into(),
                from: "Entity".into(),
                to: "Note".into(),
                properties: vec![],
            }],
        }
    }

    /// Restricts the base catalog to an extension subset named by
    /// `repository_name` (spec §4.4 `shared` schema). Unknown repository
    /// names fall back to the base set; an unrecognized extension is not a
    /// hard error, matching the fallback-on-schema-failure policy one level
    /// up.
    pub fn for_repository(repository_name: &str) -> Self {
        match repository_name {
            "sec" => {
                let mut catalog = Self::base();
                catalog.nodes.push(NodeTypeDef {
                    name: "Filing".into(),
                    properties: vec![
                        PropertyDef::new("identifier", PropertyType::String),
                        PropertyDef::new("form_type", PropertyType::String),
                        PropertyDef::new("filed_at", PropertyType::Date),
                    ],
                    primary_key: "identifier".into(),
                });
                catalog.relationships.push(RelationshipTypeDef {
                    name: "Files".into(),
                    from: "Entity".into(),
                    to: "Filing".into(),
                    properties: vec![],
                });
                catalog
            }
            _ => Self::base(),
        }
    }

    /// Minimal fallback schema applied when schema generation otherwise
    /// fails (spec §4.4 step 3: "fall back to a minimal three-statement
    /// schema ... and log a warning").
    pub fn fallback() -> Self {
        Self {
            nodes: vec![
                NodeTypeDef {
                    name: "Entity".into(),
                    properties: vec![PropertyDef::new("identifier", PropertyType::String)],
                    primary_key: "identifier".into(),
                },
                NodeTypeDef {
                    name: "Note".into(),
                    properties: vec![PropertyDef::new("identifier", PropertyType::String)],
                    primary_key: "identifier".into(),
                },
            ],
            relationships: vec![RelationshipTypeDef {
                name: "References".into(),
                from: "Entity".into(),
                to: "Note".into(),
                properties: vec![],
            }],
        }
    }

    /// Renders the catalog into a sequence of DDL statements, node tables
    /// first so relationship tables' endpoints already exist (spec §4.4:
    /// "for each relationship whose endpoints exist").
    pub fn to_ddl(&self) -> Vec<String> {
        let mut statements = Vec::with_capacity(self.nodes.len() + self.relationships.len());
        let node_names: std::collections::HashSet<&str> =
            self.nodes.iter().map(|n| n.name.as_str()).collect();

        for node in &self.nodes {
            statements.push(node_table_ddl(node));
        }
        for rel in &self.relationships {
            if node_names.contains(rel.from.as_str()) && node_names.contains(rel.to.as_str()) {
                statements.push(relationship_table_ddl(rel));
            }
        }
        statements
    }
}

fn node_table_ddl(node: &NodeTypeDef) -> String {
    let cols = node
        .properties
        .iter()
        .map(|p| format!("{} {}", p.name, p.property_type.engine_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE NODE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}))",
        node.name, cols, node.primary_key
    )
}

fn relationship_table_ddl(rel: &RelationshipTypeDef) -> String {
    let mut parts = vec![format!("FROM {} TO {}", rel.from, rel.to)];
    parts.extend(
        rel.properties
            .iter()
            .map(|p| format!("{} {}", p.name, p.property_type.engine_type())),
    );
    format!(
        "CREATE REL TABLE IF NOT EXISTS {} ({})",
        rel.name,
        parts.join(", ")
    )
}

/// Splits a `custom_schema_ddl` blob on `;`, dropping empty statements
/// (spec §4.4 `custom` schema path). Does not validate the resulting SQL;
/// execution failures surface from the engine itself and the caller aborts
/// per-statement.
pub fn split_custom_ddl(custom_schema_ddl: &str) -> Vec<String> {
    custom_schema_ddl
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns an error if `table_or_column` looks like it was meant to be
/// validated through [`TableName`] but wasn't. Schema DDL interpolates
/// catalog-defined names (trusted, compiled into this crate) rather than
/// caller-supplied ones, so this exists only for the one seam where a
/// caller-controlled name reaches DDL: custom schema statements are
/// executed as-is and are the caller's responsibility, but relationship and
/// node names coming from a repository-name lookup still pass through
/// here defensively.
pub fn validate_identifier(name: &str) -> Result<(), Error> {
    TableName::parse(name).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_catalog_emits_node_tables_before_relationships() {
        let ddl = SchemaCatalog::base().to_ddl();
        assert_eq!(ddl.len(), 3);
        assert!(ddl[0].starts_with("CREATE NODE TABLE IF NOT EXISTS Entity"));
        assert!(ddl[1].starts_with("CREATE NODE TABLE IF NOT EXISTS Note"));
        assert!(ddl[2].starts_with("CREATE REL TABLE IF NOT EXISTS References"));
        assert!(ddl[2].contains("FROM Entity TO Note"));
    }

    #[test]
    fn shared_catalog_restricts_to_named_extension() {
        let ddl = SchemaCatalog::for_repository("sec").to_ddl();
        assert!(ddl.iter().any(|s| s.contains("Filing")));

        let base_only = SchemaCatalog::for_repository("unknown-repo").to_ddl();
        assert!(!base_only.iter().any(|s| s.contains("Filing")));
    }

    #[test]
    fn relationship_dropped_when_endpoint_missing() {
        let mut catalog = SchemaCatalog::base();
        catalog.relationships.push(RelationshipTypeDef {
            name: "Orphan".into(),
            from: "Entity".into(),
            to: "DoesNotExist".into(),
            properties: vec![],
        });
        let ddl = catalog.to_ddl();
        assert!(!ddl.iter().any(|s| s.contains("Orphan")));
    }

    #[test]
    fn custom_ddl_splits_and_drops_empty_statements() {
        let stmts = split_custom_ddl("CREATE NODE TABLE A(id STRING, PRIMARY KEY(id));; ");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn fallback_schema_has_three_statements() {
        assert_eq!(SchemaCatalog::fallback().to_ddl().len(), 3);
    }
}
