//! Parser for the textual join specification.
//!
//! A spec is a comma-separated list of `left[=right]` pairs where each side is
//! either `name` or `Qualifier.name`:
//!
//! ```text
//! employee_id                                   -- owner.employee_id = target.employee_id
//! manager_id = id                               -- owner.manager_id = target.id
//! id = EmployeeProject.employee_id, EmployeeProject.project_id = id
//! ```
//!
//! Qualifiers naming neither the owner nor the referenced entity mark the join spec as a
//! two-hop join through that intermediate entity.

use std::fmt;

use thiserror::Error;

/// Relationship topology between the owner and the referenced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Column pairs link owner fields directly to referenced fields.
    Direct,
    /// An intermediate entity bridges two column pairs.
    TwoHop,
}

/// Why a join spec was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpecError {
    /// The join spec (or one of its pairs) is empty.
    #[error("empty column pair")]
    EmptyPair,
    /// A pair contains more than one `=`.
    #[error("unbalanced '=' in \"{0}\"")]
    UnbalancedEquals(String),
    /// A token is not `name` or `Qualifier.name`.
    #[error("malformed column reference \"{0}\"")]
    MalformedToken(String),
    /// A two-hop spec must have exactly two pairs.
    #[error("two-hop join through {intermediate} needs exactly 2 column pairs, found {found}")]
    PairCount { intermediate: String, found: usize },
    /// The adjoining sides of a two-hop spec name different intermediate entities.
    #[error("two-hop pairs must share the intermediate entity, found {left} and {right}")]
    IntermediateMismatch { left: String, right: String },
    /// A qualifier in a two-hop spec is on the wrong side.
    #[error("qualifier {0} is not valid in this position")]
    MisplacedQualifier(String),
}

/// One side of a column pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Entity name before the `.`, if present.
    pub qualifier: Option<String>,
    /// Field name.
    pub field: String,
}

impl Token {
    fn parse(raw: &str) -> Result<Self, SpecError> {
        let raw = raw.trim();
        let malformed = || SpecError::MalformedToken(raw.to_string());

        let (qualifier, field) = match raw.split_once('.') {
            Some((qualifier, field)) => (Some(qualifier.trim()), field.trim()),
            None => (None, raw),
        };
        if field.is_empty() || field.contains('.') || !is_identifier(field) {
            return Err(malformed());
        }
        if let Some(qualifier) = qualifier
            && (qualifier.is_empty() || !is_identifier(qualifier))
        {
            return Err(malformed());
        }

        Ok(Self {
            qualifier: qualifier.map(str::to_string),
            field: field.to_string(),
        })
    }

    fn is_qualified_by(&self, name: &str) -> bool {
        self.qualifier.as_deref().is_some_and(|q| q.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.{}", self.field),
            None => f.write_str(&self.field),
        }
    }
}

/// A (source, target) column pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    /// Left-hand side, the field compared from the owner (or intermediate) side.
    pub source: Token,
    /// Right-hand side.
    pub target: Token,
}

/// Result of parsing a join spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSpec {
    /// Detected topology.
    pub topology: Topology,
    /// Ordered column pairs. For [`Topology::Direct`] every source is an owner field
    /// and every target a referenced field. For [`Topology::TwoHop`] the first pair is
    /// `owner -> intermediate` and the second `intermediate -> referenced`.
    pub pairs: Vec<ColumnPair>,
    /// Simple name of the intermediate entity for two-hop joins.
    pub intermediate: Option<String>,
}

impl ParsedSpec {
    /// Owner-side field names, in declaration order.
    #[must_use]
    pub fn source_fields(&self) -> Vec<&str> {
        match self.topology {
            Topology::Direct => self.pairs.iter().map(|p| p.source.field.as_str()).collect(),
            Topology::TwoHop => vec![self.pairs[0].source.field.as_str()],
        }
    }

    /// Referenced-side field names, in declaration order.
    #[must_use]
    pub fn target_fields(&self) -> Vec<&str> {
        match self.topology {
            Topology::Direct => self.pairs.iter().map(|p| p.target.field.as_str()).collect(),
            Topology::TwoHop => vec![self.pairs[1].target.field.as_str()],
        }
    }
}

/// Parse `spec` for a relation from `owner` to `referenced` (both simple type names).
///
/// # Errors
///
/// Returns a [`SpecError`] when the join spec is empty, a pair is malformed, or a two-hop
/// spec doesn't have exactly two pairs sharing the same intermediate entity.
pub fn parse(spec: &str, owner: &str, referenced: &str) -> Result<ParsedSpec, SpecError> {
    let mut pairs = Vec::new();
    for raw in spec.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SpecError::EmptyPair);
        }
        let (left, right) = match raw.split_once('=') {
            Some((_, right)) if right.contains('=') => {
                return Err(SpecError::UnbalancedEquals(raw.to_string()));
            }
            Some((left, right)) => (left, Some(right)),
            None => (raw, None),
        };
        let source = Token::parse(left)?;
        let target = match right {
            Some(right) => Token::parse(right)?,
            None => source.clone(),
        };
        pairs.push(ColumnPair { source, target });
    }

    let foreign = pairs
        .iter()
        .flat_map(|pair| [&pair.source, &pair.target])
        .filter_map(|token| token.qualifier.as_deref())
        .find(|q| !q.eq_ignore_ascii_case(owner) && !q.eq_ignore_ascii_case(referenced));

    match foreign {
        None => Ok(ParsedSpec {
            topology: Topology::Direct,
            pairs: pairs.into_iter().map(|pair| orient(pair, owner, referenced)).collect(),
            intermediate: None,
        }),
        Some(intermediate) => {
            let intermediate = intermediate.to_string();
            two_hop(pairs, intermediate, owner, referenced)
        }
    }
}

// A direct pair written as `Referenced.x = Owner.y` is flipped so the source is
// always the owner side.
fn orient(pair: ColumnPair, owner: &str, referenced: &str) -> ColumnPair {
    let reversed = pair.source.is_qualified_by(referenced)
        && !pair.source.is_qualified_by(owner)
        && pair.target.is_qualified_by(owner);
    if reversed {
        ColumnPair {
            source: pair.target,
            target: pair.source,
        }
    } else {
        pair
    }
}

fn two_hop(
    pairs: Vec<ColumnPair>, intermediate: String, owner: &str, referenced: &str,
) -> Result<ParsedSpec, SpecError> {
    if pairs.len() != 2 {
        return Err(SpecError::PairCount {
            intermediate,
            found: pairs.len(),
        });
    }

    let (first, second) = (&pairs[0], &pairs[1]);
    let left = first.target.qualifier.clone().unwrap_or_default();
    let right = second.source.qualifier.clone().unwrap_or_default();
    if left.is_empty() || right.is_empty() || !left.eq_ignore_ascii_case(&right) {
        return Err(SpecError::IntermediateMismatch { left, right });
    }
    if !left.eq_ignore_ascii_case(&intermediate) {
        return Err(SpecError::MisplacedQualifier(intermediate));
    }
    if first.source.qualifier.is_some() && !first.source.is_qualified_by(owner) {
        return Err(SpecError::MisplacedQualifier(first.source.to_string()));
    }
    if second.target.qualifier.is_some() && !second.target.is_qualified_by(referenced) {
        return Err(SpecError::MisplacedQualifier(second.target.to_string()));
    }

    Ok(ParsedSpec {
        topology: Topology::TwoHop,
        pairs,
        intermediate: Some(left),
    })
}

fn is_identifier(s: &str) -> bool {
    s.chars().all(|c| c.is_alphanumeric() || c == '_')
}
