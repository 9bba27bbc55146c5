//! Static relation metadata.
//!
//! The [`RelationCatalog`] knows, for every relation name the engine cares
//! about, its inverse, its [`RelationType`], and whether it is transitive,
//! part-of and canonical. Relations are registered in pairs; the first name
//! of a pair is the canonical direction, the one closure is computed for.
//!
//! The catalog is immutable once built. [`RelationCatalog::standard`] returns
//! the process-wide instance with the lexical relations; tests can assemble
//! their own with [`RelationCatalog::builder`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Well-known relation names.
pub mod names {
    pub const HYPERNYM: &str = "hypernym";
    pub const HYPONYM: &str = "hyponym";
    pub const HYPERNYM_INSTANCE: &str = "hypernymInstance";
    pub const HYPONYM_INSTANCE: &str = "hyponymInstance";
    pub const HOLONYM: &str = "holonym";
    pub const MERONYM: &str = "meronym";
    pub const HOLONYM_COMPONENT: &str = "holonymComponent";
    pub const MERONYM_COMPONENT: &str = "meronymComponent";
    pub const HOLONYM_MEMBER: &str = "holonymMember";
    pub const MERONYM_MEMBER: &str = "meronymMember";
    pub const HOLONYM_PART: &str = "holonymPart";
    pub const MERONYM_PART: &str = "meronymPart";
    pub const HOLONYM_PORTION: &str = "holonymPortion";
    pub const MERONYM_PORTION: &str = "meronymPortion";
    pub const HOLONYM_SUBSTANCE: &str = "holonymSubstance";
    pub const MERONYM_SUBSTANCE: &str = "meronymSubstance";
    pub const SYNONYM: &str = "synonym";
    pub const SYNONYM_NEAR: &str = "synonymNear";
    pub const ANTONYM: &str = "antonym";
}

// ---------------------------------------------------------------------------
// RelationType
// ---------------------------------------------------------------------------

/// Semantic family of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    Taxonomic,
    PartWhole,
    Association,
    Complementary,
}

impl RelationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Taxonomic => "taxonomic",
            Self::PartWhole => "partWhole",
            Self::Association => "association",
            Self::Complementary => "complementary",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "taxonomic" => Ok(Self::Taxonomic),
            "partWhole" | "part-whole" | "part_whole" => Ok(Self::PartWhole),
            "association" => Ok(Self::Association),
            "complementary" => Ok(Self::Complementary),
            other => Err(GraphError::InvalidArgument(format!(
                "unknown relation type '{other}': expected one of taxonomic, partWhole, association, complementary"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// One registered relation pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationPair<'a> {
    pub canonical: &'a str,
    pub inverse: &'a str,
    pub relation_type: RelationType,
    pub transitive: bool,
    pub part_of: bool,
}

const fn pair(
    canonical: &'static str,
    inverse: &'static str,
    relation_type: RelationType,
    transitive: bool,
    part_of: bool,
) -> RelationPair<'static> {
    RelationPair {
        canonical,
        inverse,
        relation_type,
        transitive,
        part_of,
    }
}

/// Relation pairs of the standard catalog, in registration order.
pub const STANDARD_PAIRS: &[RelationPair<'static>] = &[
    pair(names::HYPERNYM, names::HYPONYM, RelationType::Taxonomic, true, false),
    pair(
        names::HYPERNYM_INSTANCE,
        names::HYPONYM_INSTANCE,
        RelationType::Taxonomic,
        false,
        false,
    ),
    pair(names::HOLONYM, names::MERONYM, RelationType::PartWhole, true, true),
    pair(
        names::HOLONYM_COMPONENT,
        names::MERONYM_COMPONENT,
        RelationType::PartWhole,
        false,
        true,
    ),
    pair(
        names::HOLONYM_MEMBER,
        names::MERONYM_MEMBER,
        RelationType::PartWhole,
        false,
        true,
    ),
    pair(
        names::HOLONYM_PART,
        names::MERONYM_PART,
        RelationType::PartWhole,
        true,
        true,
    ),
    pair(
        names::HOLONYM_PORTION,
        names::MERONYM_PORTION,
        RelationType::PartWhole,
        false,
        true,
    ),
    pair(
        names::HOLONYM_SUBSTANCE,
        names::MERONYM_SUBSTANCE,
        RelationType::PartWhole,
        false,
        true,
    ),
    pair(names::SYNONYM, names::SYNONYM, RelationType::Association, false, false),
    pair(
        names::SYNONYM_NEAR,
        names::SYNONYM_NEAR,
        RelationType::Association,
        false,
        false,
    ),
    pair(names::ANTONYM, names::ANTONYM, RelationType::Complementary, false, false),
];

static STANDARD: LazyLock<RelationCatalog> =
    LazyLock::new(|| RelationCatalog::from_pairs(STANDARD_PAIRS.iter().copied()));

// ---------------------------------------------------------------------------
// RelationInfo
// ---------------------------------------------------------------------------

/// Everything the catalog knows about one relation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationInfo {
    pub name: String,
    pub inverse: Option<String>,
    pub relation_type: RelationType,
    pub transitive: bool,
    pub part_of: bool,
    pub canonical: bool,
}

// ---------------------------------------------------------------------------
// RelationCatalog
// ---------------------------------------------------------------------------

/// Immutable lookup table of relation metadata.
#[derive(Debug, Clone)]
pub struct RelationCatalog {
    entries: Vec<RelationInfo>,
    by_name: HashMap<String, usize>,
    canonical: Vec<String>,
    canonical_transitive: Vec<String>,
    canonical_part_of: Vec<String>,
}

impl RelationCatalog {
    /// The process-wide catalog of lexical relations.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Start assembling a custom catalog.
    #[must_use]
    pub fn builder() -> RelationCatalogBuilder {
        RelationCatalogBuilder::default()
    }

    fn from_pairs<'a>(pairs: impl IntoIterator<Item = RelationPair<'a>>) -> Self {
        let mut catalog = Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
            canonical: Vec::new(),
            canonical_transitive: Vec::new(),
            canonical_part_of: Vec::new(),
        };

        for p in pairs {
            catalog.register(p.canonical, p.inverse, &p, true);
            if p.inverse != p.canonical {
                catalog.register(p.inverse, p.canonical, &p, false);
            }
            push_unique(&mut catalog.canonical, p.canonical);
            if p.transitive {
                push_unique(&mut catalog.canonical_transitive, p.canonical);
            }
            if p.part_of {
                push_unique(&mut catalog.canonical_part_of, p.canonical);
            }
        }

        catalog
    }

    fn register(&mut self, name: &str, inverse: &str, p: &RelationPair<'_>, canonical: bool) {
        let info = RelationInfo {
            name: name.to_string(),
            inverse: Some(inverse.to_string()),
            relation_type: p.relation_type,
            transitive: p.transitive,
            part_of: p.part_of,
            canonical,
        };
        match self.by_name.get(name) {
            Some(&idx) => {
                // A later registration wins, but a name stays canonical once
                // any pair has declared it so.
                let was_canonical = self.entries[idx].canonical;
                self.entries[idx] = RelationInfo {
                    canonical: was_canonical || canonical,
                    ..info
                };
            }
            None => {
                self.by_name.insert(name.to_string(), self.entries.len());
                self.entries.push(info);
            }
        }
    }

    fn get(&self, name: &str) -> Option<&RelationInfo> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    /// Full metadata for `name`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty name, `NotFound` if unregistered.
    pub fn info(&self, name: &str) -> Result<&RelationInfo> {
        check_name(name)?;
        self.get(name)
            .ok_or_else(|| GraphError::NotFound(format!("relation '{name}' is not registered")))
    }

    #[must_use]
    pub fn is_canonical(&self, name: &str) -> bool {
        self.get(name).is_some_and(|info| info.canonical)
    }

    #[must_use]
    pub fn has_inverse(&self, name: &str) -> bool {
        self.get(name).is_some_and(|info| info.inverse.is_some())
    }

    /// The registered inverse of `name`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty name, `NotFound` when no inverse is
    /// registered.
    pub fn inverse(&self, name: &str) -> Result<&str> {
        check_name(name)?;
        self.get(name)
            .and_then(|info| info.inverse.as_deref())
            .ok_or_else(|| {
                GraphError::NotFound(format!("relation '{name}' has no registered inverse"))
            })
    }

    /// Note: `false` means the catalog doesn't *know* the two are inverses.
    #[must_use]
    pub fn is_inverse(&self, a: &str, b: &str) -> bool {
        self.get(a)
            .and_then(|info| info.inverse.as_deref())
            .is_some_and(|inverse| inverse == b)
    }

    #[must_use]
    pub fn is_transitive(&self, name: &str) -> bool {
        self.get(name).is_some_and(|info| info.transitive)
    }

    #[must_use]
    pub fn is_part_of(&self, name: &str) -> bool {
        self.get(name).is_some_and(|info| info.part_of)
    }

    /// # Errors
    ///
    /// `InvalidArgument` for an empty name, `NotFound` if unregistered.
    pub fn relation_type(&self, name: &str) -> Result<RelationType> {
        self.info(name).map(|info| info.relation_type)
    }

    /// Canonical relations, inverses excluded.
    #[must_use]
    pub fn canonical_relations(&self) -> &[String] {
        &self.canonical
    }

    /// Every registered relation, inverses included, in registration order.
    pub fn relations(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|info| info.name.as_str())
    }

    /// The relations transitive closure is computed for.
    #[must_use]
    pub fn canonical_transitive_relations(&self) -> &[String] {
        &self.canonical_transitive
    }

    /// Transitive relations, inverses included.
    pub fn transitive_relations(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|info| info.transitive)
            .map(|info| info.name.as_str())
    }

    #[must_use]
    pub fn canonical_part_of_relations(&self) -> &[String] {
        &self.canonical_part_of
    }

    /// Part-of relations, inverses included.
    pub fn part_of_relations(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|info| info.part_of)
            .map(|info| info.name.as_str())
    }

    /// Number of registered relation names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(GraphError::InvalidArgument(
            "relation name must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects relation pairs for a custom [`RelationCatalog`].
#[derive(Debug, Default)]
pub struct RelationCatalogBuilder {
    pairs: Vec<(String, String, RelationType, bool, bool)>,
}

impl RelationCatalogBuilder {
    /// Register `canonical` and `inverse` as each other's inverse. Use the
    /// same name twice for a symmetric relation.
    #[must_use]
    pub fn pair(
        mut self,
        canonical: &str,
        inverse: &str,
        relation_type: RelationType,
        transitive: bool,
        part_of: bool,
    ) -> Self {
        self.pairs.push((
            canonical.to_string(),
            inverse.to_string(),
            relation_type,
            transitive,
            part_of,
        ));
        self
    }

    /// Start from the standard pairs.
    #[must_use]
    pub fn with_standard_pairs(mut self) -> Self {
        for p in STANDARD_PAIRS {
            self = self.pair(p.canonical, p.inverse, p.relation_type, p.transitive, p.part_of);
        }
        self
    }

    /// # Errors
    ///
    /// `InvalidArgument` if any registered name is empty.
    pub fn build(self) -> Result<RelationCatalog> {
        for (canonical, inverse, ..) in &self.pairs {
            check_name(canonical)?;
            check_name(inverse)?;
        }

        Ok(RelationCatalog::from_pairs(self.pairs.iter().map(
            |(canonical, inverse, relation_type, transitive, part_of)| RelationPair {
                canonical,
                inverse,
                relation_type: *relation_type,
                transitive: *transitive,
                part_of: *part_of,
            },
        )))
    }
}
