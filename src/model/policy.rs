use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Usage constraint attached to a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Policy {
    /// Usable in every role.
    Public,
    /// Usable only to relate rows: join conditions and filters.
    JoinOnly,
    /// Usable only as the argument of an allowed aggregate.
    AggOnly,
    /// Never usable.
    Hidden,
}

impl Policy {
    /// Every policy, in declaration order.
    pub const ALL: [Policy; 4] = [
        Policy::Public,
        Policy::JoinOnly,
        Policy::AggOnly,
        Policy::Hidden,
    ];

    /// Stable name used in serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            Policy::Public => "Public",
            Policy::JoinOnly => "JoinOnly",
            Policy::AggOnly => "AggOnly",
            Policy::Hidden => "Hidden",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Policy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Policy::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid policy: {s}"))
    }
}

/// Syntactic position a column reference occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Bare (non-aggregated) entry of a select list.
    SelectExpr,
    /// Operand of a `FROM ... ON` join predicate.
    JoinCond,
    /// Operand of a `WHERE` predicate.
    WherePred,
    /// Argument of an aggregate in a select list.
    AggArg,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 4] = [
        Role::SelectExpr,
        Role::JoinCond,
        Role::WherePred,
        Role::AggArg,
    ];

    /// Stable name used in serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::SelectExpr => "SelectExpr",
            Role::JoinCond => "JoinCond",
            Role::WherePred => "WherePred",
            Role::AggArg => "AggArg",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate applied to a column unit or select-list entry.
///
/// Serialized as its integer id (`none=0` through `avg=5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AggregateId {
    /// No aggregate.
    #[default]
    None,
    /// `MAX(...)`
    Max,
    /// `MIN(...)`
    Min,
    /// `COUNT(...)`
    Count,
    /// `SUM(...)`
    Sum,
    /// `AVG(...)`
    Avg,
}

impl AggregateId {
    /// Every aggregate id, in numeric order.
    pub const ALL: [AggregateId; 6] = [
        AggregateId::None,
        AggregateId::Max,
        AggregateId::Min,
        AggregateId::Count,
        AggregateId::Sum,
        AggregateId::Avg,
    ];

    /// Numeric id.
    pub fn id(self) -> u8 {
        match self {
            AggregateId::None => 0,
            AggregateId::Max => 1,
            AggregateId::Min => 2,
            AggregateId::Count => 3,
            AggregateId::Sum => 4,
            AggregateId::Avg => 5,
        }
    }

    /// True for every variant except [`AggregateId::None`].
    pub fn is_aggregate(self) -> bool {
        self != AggregateId::None
    }

    /// Recognize an aggregate from a (case-insensitive) SQL function name.
    pub fn from_function_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "max" => Some(AggregateId::Max),
            "min" => Some(AggregateId::Min),
            "count" => Some(AggregateId::Count),
            "sum" => Some(AggregateId::Sum),
            "avg" => Some(AggregateId::Avg),
            _ => None,
        }
    }

    /// Upper-case SQL function name, or `None` for [`AggregateId::None`].
    pub fn function_name(self) -> Option<&'static str> {
        match self {
            AggregateId::None => None,
            AggregateId::Max => Some("MAX"),
            AggregateId::Min => Some("MIN"),
            AggregateId::Count => Some("COUNT"),
            AggregateId::Sum => Some("SUM"),
            AggregateId::Avg => Some("AVG"),
        }
    }
}

impl From<AggregateId> for u8 {
    fn from(value: AggregateId) -> Self {
        value.id()
    }
}

impl TryFrom<u8> for AggregateId {
    type Error = String;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        AggregateId::ALL
            .into_iter()
            .find(|agg| agg.id() == value)
            .ok_or_else(|| format!("Invalid aggregate id: {value}"))
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Build the `table.column` key used by policy maps and violations.
pub fn qualified_name(table: &str, column: &str) -> String {
    format!("{table}.{column}")
}

/// A column reference extracted from a query, tagged with its role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Owning table (catalog spelling).
    pub table: String,
    /// Column name (catalog spelling).
    pub column: String,
    /// Syntactic position of the reference.
    pub role: Role,
    /// Effective aggregate applied to the reference.
    pub agg: AggregateId,
}

impl ColumnRef {
    /// `table.column`
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.table, &self.column)
    }
}

/// A column reference whose role is not permitted under its policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Qualified `table.column` name.
    pub column: String,
    /// Role the column was used in.
    pub role: Role,
    /// Policy the column carries.
    pub policy: Policy,
    /// Effective aggregate of the reference.
    pub agg_id: AggregateId,
}

impl Violation {
    /// Column name without its table qualifier.
    pub fn bare_column(&self) -> &str {
        crate::parser::names::bare_column_name(&self.column)
    }

    /// Table part of the qualified name.
    pub fn table(&self) -> &str {
        crate::parser::names::table_of_qualified(&self.column)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.column, self.role, self.policy, self.agg_id
        )
    }
}

/// Per-database column policy assignment keyed by `table.column`.
///
/// Lookups of columns that were never assigned return [`Policy::Public`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyMap {
    entries: BTreeMap<String, Policy>,
}

impl PolicyMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `policy` to `table.column`, returning the previous value.
    pub fn insert(&mut self, table: &str, column: &str, policy: Policy) -> Option<Policy> {
        self.entries.insert(qualified_name(table, column), policy)
    }

    /// Explicit entry for a qualified name, if any.
    pub fn get(&self, qualified: &str) -> Option<Policy> {
        self.entries.get(qualified).copied()
    }

    /// Policy of `table.column`, defaulting to [`Policy::Public`].
    pub fn policy_of(&self, table: &str, column: &str) -> Policy {
        self.policy_of_qualified(&qualified_name(table, column))
    }

    /// Policy of a qualified name, defaulting to [`Policy::Public`].
    pub fn policy_of_qualified(&self, qualified: &str) -> Policy {
        self.get(qualified).unwrap_or(Policy::Public)
    }

    /// Replace the policy of an existing entry. Returns `false` when absent.
    pub fn replace_existing(&mut self, qualified: &str, policy: Policy) -> bool {
        match self.entries.get_mut(qualified) {
            Some(slot) => {
                *slot = policy;
                true
            }
            None => false,
        }
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Policy)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no column has an explicit entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Policy)> for PolicyMap {
    fn from_iter<I: IntoIterator<Item = (String, Policy)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
