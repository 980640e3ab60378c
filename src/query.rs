//! The filtered-query algebra.
//!
//! A [`Filter`] is what callers hand in; a [`Query`] is the normalized
//! predicate handed to the attribute store. Every backend consumes the same
//! predicate: SimpleDB-style stores render it with [`Query::expression`],
//! the in-memory store evaluates it structurally with [`Query::matches`].
//! Filter values are sorted during normalization so that two calls with the
//! same filter sets produce byte-identical query text.

use crate::store::AttrMap;

/// A package filter. Empty lists mean "no restriction on this attribute".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Package names; exact matches, or prefixes when `name_wildcard`.
    pub names: Vec<String>,
    /// Distribution names.
    pub dists: Vec<String>,
    /// Component names.
    pub comps: Vec<String>,
    /// Architecture names.
    pub archs: Vec<String>,
    /// Version strings.
    pub versions: Vec<String>,
    /// Treat `names` as case-sensitive prefixes instead of exact matches.
    pub name_wildcard: bool,
}

impl Filter {
    /// A filter restricted to a set of package names.
    pub fn names<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// A normalized query over one attribute-store domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    domain: String,
    names: Vec<String>,
    dists: Vec<String>,
    comps: Vec<String>,
    archs: Vec<String>,
    versions: Vec<String>,
    wildcard: bool,
}

impl Query {
    /// Normalize a filter into a query against `domain`.
    pub fn build(domain: &str, filter: &Filter) -> Self {
        Self {
            domain: domain.to_string(),
            names: sorted(&filter.names),
            dists: sorted(&filter.dists),
            comps: sorted(&filter.comps),
            archs: sorted(&filter.archs),
            versions: sorted(&filter.versions),
            wildcard: filter.name_wildcard,
        }
    }

    /// Render the select expression for a SimpleDB-style backend.
    ///
    /// The base predicate (`name` is not null) keeps non-package items such
    /// as the repository metadata out of every result set. Each non-empty
    /// filter list becomes one `every(attr) in (…)` conjunct; wildcard names
    /// become a disjunction of LIKE clauses, one per name. SimpleDB does not
    /// support `every(name) LIKE (…)`, and each LIKE costs one predicate, so
    /// wildcard queries with many names hit the statement predicate limit
    /// quickly.
    pub fn expression(&self) -> String {
        let mut query = format!(
            "select * from `{}` where `name` is not null",
            self.domain
        );
        let mut selectors = Vec::new();
        if !self.names.is_empty() {
            if self.wildcard {
                let clauses: Vec<String> = self
                    .names
                    .iter()
                    .map(|name| format!("`name` LIKE '{}%'", name))
                    .collect();
                selectors.push(clauses.join(" or "));
            } else {
                selectors.push(every_clause("name", &self.names));
            }
        }
        if !self.dists.is_empty() {
            selectors.push(every_clause("distribution", &self.dists));
        }
        if !self.comps.is_empty() {
            selectors.push(every_clause("component", &self.comps));
        }
        if !self.archs.is_empty() {
            selectors.push(every_clause("architecture", &self.archs));
        }
        if !self.versions.is_empty() {
            selectors.push(every_clause("version", &self.versions));
        }
        if !selectors.is_empty() {
            query.push_str(" and ");
            query.push_str(&selectors.join(" and "));
        }
        query
    }

    /// Evaluate the predicate against one attribute map, with the same
    /// semantics the rendered expression has on the backend: `every()`
    /// requires each value of a multi-valued attribute to match one of the
    /// literals, LIKE matches if any value starts with the prefix, and an
    /// item without the attribute never matches a clause on it.
    pub fn matches(&self, attrs: &AttrMap) -> bool {
        if attrs.get("name").map_or(true, |values| values.is_empty()) {
            return false;
        }
        if !self.names.is_empty() {
            if self.wildcard {
                let any_prefix = attrs["name"].iter().any(|value| {
                    self.names.iter().any(|prefix| value.starts_with(prefix))
                });
                if !any_prefix {
                    return false;
                }
            } else if !every_in(attrs, "name", &self.names) {
                return false;
            }
        }
        (self.dists.is_empty() || every_in(attrs, "distribution", &self.dists))
            && (self.comps.is_empty() || every_in(attrs, "component", &self.comps))
            && (self.archs.is_empty() || every_in(attrs, "architecture", &self.archs))
            && (self.versions.is_empty() || every_in(attrs, "version", &self.versions))
    }
}

fn sorted(values: &[String]) -> Vec<String> {
    let mut values = values.to_vec();
    values.sort();
    values
}

fn every_clause(attr: &str, values: &[String]) -> String {
    let literals: Vec<String> = values.iter().map(|value| format!("'{}'", value)).collect();
    format!("every({}) in ({})", attr, literals.join(","))
}

fn every_in(attrs: &AttrMap, attr: &str, allowed: &[String]) -> bool {
    match attrs.get(attr) {
        Some(values) if !values.is_empty() => {
            values.iter().all(|value| allowed.contains(value))
        }
        _ => false,
    }
}
