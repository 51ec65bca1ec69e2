use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::{AuditError, Result};
use crate::parser::names::normalize_identifier;

/// Index of a column in a [`Catalog`]. Index `0` is the wildcard `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(pub usize);

impl ColumnId {
    /// The wildcard column `*`.
    pub const WILDCARD: ColumnId = ColumnId(0);

    /// True for the wildcard column.
    pub fn is_wildcard(self) -> bool {
        self == Self::WILDCARD
    }
}

/// Index of a table in a [`Catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub usize);

/// A single catalog column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    /// Owning table, `None` for the wildcard.
    pub table: Option<TableId>,
    /// Column name as declared.
    pub name: String,
    /// Declared type (`text`, `number`, ...); empty when unknown.
    pub data_type: String,
}

/// Per-database table/column registry.
///
/// Built once per database and shared read-only by every query against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    db_id: String,
    table_names: Vec<String>,
    columns: Vec<CatalogColumn>,
    primary_keys: BTreeSet<ColumnId>,
    foreign_keys: Vec<(ColumnId, ColumnId)>,
}

impl Catalog {
    /// Start building a catalog for `db_id`.
    pub fn builder(db_id: impl Into<String>) -> CatalogBuilder {
        CatalogBuilder {
            db_id: db_id.into(),
            table_names: Vec::new(),
            columns: vec![wildcard_column()],
            primary_keys: BTreeSet::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Database identifier.
    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    /// Declared table names, indexed by [`TableId`].
    pub fn table_names(&self) -> &[String] {
        &self.table_names
    }

    /// Number of columns including the wildcard.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Name of a table.
    pub fn table_name(&self, id: TableId) -> Result<&str> {
        self.table_names
            .get(id.0)
            .map(String::as_str)
            .ok_or(AuditError::UnresolvableTableIndex { index: id.0 })
    }

    /// Look up a table by case-insensitive name.
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        let wanted = normalize_identifier(name);
        self.table_names
            .iter()
            .position(|t| normalize_identifier(t) == wanted)
            .map(TableId)
    }

    /// Column metadata for an index.
    pub fn column(&self, id: ColumnId) -> Result<&CatalogColumn> {
        self.columns
            .get(id.0)
            .ok_or(AuditError::UnresolvableColumnIndex { index: id.0 })
    }

    /// Resolve a column index to its `(table, column)` pair.
    ///
    /// Fails for indices outside the catalog and for the table-less wildcard.
    pub fn resolve(&self, id: ColumnId) -> Result<(&str, &str)> {
        let column = self.column(id)?;
        let table = column
            .table
            .ok_or(AuditError::UnresolvableColumnIndex { index: id.0 })?;
        Ok((self.table_name(table)?, column.name.as_str()))
    }

    /// Columns of a table in declaration order.
    pub fn columns_of(&self, table: TableId) -> impl Iterator<Item = (ColumnId, &CatalogColumn)> {
        self.columns
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.table == Some(table))
            .map(|(idx, c)| (ColumnId(idx), c))
    }

    /// Every non-wildcard column in declaration order.
    pub fn all_columns(&self) -> impl Iterator<Item = (ColumnId, &CatalogColumn)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.table.is_some())
            .map(|(idx, c)| (ColumnId(idx), c))
    }

    /// Look up a column of `table` by case-insensitive name.
    pub fn column_id(&self, table: TableId, name: &str) -> Option<ColumnId> {
        let wanted = normalize_identifier(name);
        self.columns_of(table)
            .find(|(_, c)| normalize_identifier(&c.name) == wanted)
            .map(|(id, _)| id)
    }

    /// True when the column is part of its table's primary key.
    pub fn is_primary_key(&self, id: ColumnId) -> bool {
        self.primary_keys.contains(&id)
    }

    /// Declared foreign keys as `(from, to)` column pairs.
    pub fn foreign_keys(&self) -> &[(ColumnId, ColumnId)] {
        &self.foreign_keys
    }
}

fn wildcard_column() -> CatalogColumn {
    CatalogColumn {
        table: None,
        name: "*".to_string(),
        data_type: "text".to_string(),
    }
}

/// Incremental [`Catalog`] construction, mostly for tests and fixtures.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    db_id: String,
    table_names: Vec<String>,
    columns: Vec<CatalogColumn>,
    primary_keys: BTreeSet<ColumnId>,
    foreign_keys: Vec<(ColumnId, ColumnId)>,
}

impl CatalogBuilder {
    /// Append a table and its columns.
    pub fn table(mut self, name: &str, columns: &[&str]) -> Self {
        let table = TableId(self.table_names.len());
        self.table_names.push(name.to_string());
        for column in columns {
            self.columns.push(CatalogColumn {
                table: Some(table),
                name: (*column).to_string(),
                data_type: String::new(),
            });
        }
        self
    }

    /// Mark `table.column` as a primary-key column. Unknown names are ignored.
    pub fn primary_key(mut self, table: &str, column: &str) -> Self {
        if let Some(id) = self.find(table, column) {
            self.primary_keys.insert(id);
        }
        self
    }

    /// Record a foreign key between two declared columns. Unknown names are ignored.
    pub fn foreign_key(mut self, from: (&str, &str), to: (&str, &str)) -> Self {
        if let (Some(a), Some(b)) = (self.find(from.0, from.1), self.find(to.0, to.1)) {
            self.foreign_keys.push((a, b));
        }
        self
    }

    fn find(&self, table: &str, column: &str) -> Option<ColumnId> {
        let table = self.table_names.iter().position(|t| t == table)?;
        self.columns
            .iter()
            .position(|c| c.table == Some(TableId(table)) && c.name == column)
            .map(ColumnId)
    }

    /// Finish construction.
    pub fn build(self) -> Catalog {
        Catalog {
            db_id: self.db_id,
            table_names: self.table_names,
            columns: self.columns,
            primary_keys: self.primary_keys,
            foreign_keys: self.foreign_keys,
        }
    }
}

/// Primary-key entry of a Spider schema: a single column or a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKeyEntry {
    /// Single-column key.
    Single(usize),
    /// Composite key.
    Composite(Vec<usize>),
}

/// One database entry of a Spider `tables.json` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiderSchema {
    /// Database identifier.
    pub db_id: String,
    /// Table names as declared in the database.
    pub table_names_original: Vec<String>,
    /// `(table_index, column_name)`; the first entry is `(-1, "*")`.
    pub column_names_original: Vec<(i64, String)>,
    /// Declared column types, parallel to `column_names_original`.
    #[serde(default)]
    pub column_types: Vec<String>,
    /// Primary-key column indices.
    #[serde(default)]
    pub primary_keys: Vec<PrimaryKeyEntry>,
    /// Foreign keys as `(from_column, to_column)` indices.
    #[serde(default)]
    pub foreign_keys: Vec<(usize, usize)>,
}

impl TryFrom<SpiderSchema> for Catalog {
    type Error = AuditError;

    fn try_from(schema: SpiderSchema) -> Result<Self> {
        let table_count = schema.table_names_original.len();
        let column_count = schema.column_names_original.len();

        // Column and key indices are positions in `column_names_original`,
        // so the leading `(-1, "*")` entry must be there and nowhere else.
        let invalid = |message: &str| AuditError::InvalidSchema {
            db_id: schema.db_id.clone(),
            message: message.to_string(),
        };
        let mut columns = Vec::with_capacity(column_count);
        for (idx, (table_idx, name)) in schema.column_names_original.iter().enumerate() {
            let table = match usize::try_from(*table_idx) {
                Ok(_) if idx == 0 => {
                    return Err(invalid("first column must be the (-1, \"*\") wildcard"))
                }
                Ok(t) if t < table_count => Some(TableId(t)),
                Ok(t) => return Err(AuditError::UnresolvableTableIndex { index: t }),
                Err(_) if idx == 0 => None,
                Err(_) => return Err(invalid("only the first column may belong to no table")),
            };
            columns.push(CatalogColumn {
                table,
                name: name.clone(),
                data_type: schema.column_types.get(idx).cloned().unwrap_or_default(),
            });
        }
        if columns.is_empty() {
            return Err(invalid("column list is empty"));
        }

        let check = |idx: usize| -> Result<ColumnId> {
            if idx < columns.len() {
                Ok(ColumnId(idx))
            } else {
                Err(AuditError::UnresolvableColumnIndex { index: idx })
            }
        };

        let mut primary_keys = BTreeSet::new();
        for entry in &schema.primary_keys {
            match entry {
                PrimaryKeyEntry::Single(idx) => {
                    primary_keys.insert(check(*idx)?);
                }
                PrimaryKeyEntry::Composite(indices) => {
                    for idx in indices {
                        primary_keys.insert(check(*idx)?);
                    }
                }
            }
        }

        let foreign_keys = schema
            .foreign_keys
            .iter()
            .map(|(from, to)| Ok((check(*from)?, check(*to)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Catalog {
            db_id: schema.db_id,
            table_names: schema.table_names_original,
            columns,
            primary_keys,
            foreign_keys,
        })
    }
}

/// Parse a Spider `tables.json` document into catalogs keyed by database id.
pub fn catalogs_from_json(json: &str) -> Result<BTreeMap<String, Catalog>> {
    let schemas: Vec<SpiderSchema> = serde_json::from_str(json)?;
    schemas
        .into_iter()
        .map(|schema| {
            let catalog = Catalog::try_from(schema)?;
            Ok((catalog.db_id().to_string(), catalog))
        })
        .collect()
}

/// Read and parse a Spider `tables.json` file.
pub fn load_catalogs(path: &Path) -> Result<BTreeMap<String, Catalog>> {
    let json = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
    catalogs_from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLES_JSON: &str = r#"[{
        "db_id": "concert_singer",
        "table_names_original": ["stadium", "singer"],
        "column_names_original": [[-1, "*"], [0, "Stadium_ID"], [0, "Name"], [1, "Singer_ID"], [1, "Name"], [1, "Email"]],
        "column_types": ["text", "number", "text", "number", "text", "text"],
        "primary_keys": [1, [3]],
        "foreign_keys": [[3, 1]]
    }]"#;

    #[test]
    fn spider_schema_builds_catalog() {
        let catalogs = catalogs_from_json(TABLES_JSON).expect("tables.json should parse");
        let catalog = &catalogs["concert_singer"];

        assert_eq!(catalog.table_names(), ["stadium", "singer"]);
        assert_eq!(catalog.column_count(), 6);
        assert_eq!(catalog.resolve(ColumnId(4)).unwrap(), ("singer", "Name"));
        assert!(catalog.is_primary_key(ColumnId(1)));
        assert!(catalog.is_primary_key(ColumnId(3)));
        assert!(!catalog.is_primary_key(ColumnId(4)));
        assert_eq!(catalog.foreign_keys(), [(ColumnId(3), ColumnId(1))]);
        assert_eq!(catalog.column(ColumnId(5)).unwrap().data_type, "text");
    }

    #[test]
    fn resolve_rejects_out_of_range_and_wildcard() {
        let catalogs = catalogs_from_json(TABLES_JSON).unwrap();
        let catalog = &catalogs["concert_singer"];

        assert!(matches!(
            catalog.resolve(ColumnId(42)),
            Err(AuditError::UnresolvableColumnIndex { index: 42 })
        ));
        assert!(catalog.resolve(ColumnId::WILDCARD).is_err());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let catalog = Catalog::builder("db")
            .table("Singer", &["Singer_ID", "Name"])
            .primary_key("Singer", "Singer_ID")
            .build();

        let table = catalog.table_id("singer").expect("table should resolve");
        assert_eq!(catalog.column_id(table, "singer_id"), Some(ColumnId(1)));
        assert_eq!(catalog.column_id(table, "missing"), None);
        assert!(catalog.is_primary_key(ColumnId(1)));
    }

    #[test]
    fn spider_schema_without_leading_wildcard_is_rejected() {
        let json = r#"[{
            "db_id": "unshifted",
            "table_names_original": ["t"],
            "column_names_original": [[0, "a"], [0, "b"]],
            "primary_keys": [0]
        }]"#;
        let err = catalogs_from_json(json).expect_err("missing wildcard should fail");
        assert!(
            matches!(&err, AuditError::InvalidSchema { db_id, .. } if db_id == "unshifted"),
            "{err}"
        );
    }

    #[test]
    fn spider_schema_rejects_misplaced_wildcard() {
        let json = r#"[{
            "db_id": "misplaced",
            "table_names_original": ["t"],
            "column_names_original": [[-1, "*"], [0, "a"], [-1, "*"]]
        }]"#;
        assert!(matches!(
            catalogs_from_json(json),
            Err(AuditError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn spider_schema_rejects_bad_table_index() {
        let json = r#"[{
            "db_id": "broken",
            "table_names_original": ["t"],
            "column_names_original": [[-1, "*"], [3, "x"]]
        }]"#;
        let err = catalogs_from_json(json).expect_err("bad table index should fail");
        assert!(matches!(err, AuditError::UnresolvableTableIndex { index: 3 }));
    }
}
