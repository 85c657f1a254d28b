//! Variant declarations and resolution
//!
//! A variant is a named build option with a closed domain: either a
//! boolean or one value out of a fixed list of choices. Requests use the
//! usual spec syntax (`+debug`, `~shared`, `threads=multi`) and are resolved
//! once, against the recipe's declarations, into a [`VariantSelection`].
//! Recipes then query the selection by name instead of re-parsing strings.
//!
//! Resolution priority is request > inherited (from a dependent's edge) >
//! declared default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::VariantError;

/// A variant value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Choice(String),
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Choice(s) => f.write_str(s),
        }
    }
}

/// Closed domain of a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantDomain {
    Bool,
    Choice(Vec<String>),
}

/// Variant declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDef {
    /// Value used when nothing is requested
    pub default: VariantValue,
    /// Human-readable description
    pub description: String,
    /// Allowed values
    pub domain: VariantDomain,
}

impl VariantDef {
    /// Boolean variant
    pub fn boolean(default: bool, description: &str) -> Self {
        Self {
            default: VariantValue::Bool(default),
            description: description.to_string(),
            domain: VariantDomain::Bool,
        }
    }

    /// Enumerated variant
    pub fn choice(default: &str, choices: &[&str], description: &str) -> Self {
        Self {
            default: VariantValue::Choice(default.to_string()),
            description: description.to_string(),
            domain: VariantDomain::Choice(choices.iter().map(ToString::to_string).collect()),
        }
    }

    /// Check a value against the domain
    pub fn validate(&self, name: &str, value: &VariantValue) -> Result<(), VariantError> {
        match (&self.domain, value) {
            (VariantDomain::Bool, VariantValue::Bool(_)) => Ok(()),
            (VariantDomain::Bool, VariantValue::Choice(got)) => Err(VariantError::InvalidType {
                name: name.to_string(),
                expected: "boolean".to_string(),
                got: got.clone(),
            }),
            (VariantDomain::Choice(choices), VariantValue::Choice(s)) => {
                if choices.contains(s) {
                    Ok(())
                } else {
                    Err(VariantError::InvalidChoice {
                        name: name.to_string(),
                        value: s.clone(),
                        choices: choices.clone(),
                    })
                }
            }
            (VariantDomain::Choice(choices), VariantValue::Bool(b)) => {
                Err(VariantError::InvalidChoice {
                    name: name.to_string(),
                    value: b.to_string(),
                    choices: choices.clone(),
                })
            }
        }
    }

    /// Domain as display text
    pub fn domain_text(&self) -> String {
        match &self.domain {
            VariantDomain::Bool => "true, false".to_string(),
            VariantDomain::Choice(choices) => choices.join(", "),
        }
    }
}

/// A single `+name`, `~name` or `name=value` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRequest {
    pub name: String,
    pub value: VariantValue,
}

impl VariantRequest {
    /// `+name`
    pub fn enable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: VariantValue::Bool(true),
        }
    }

    /// `~name`
    pub fn disable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: VariantValue::Bool(false),
        }
    }

    /// `name=value`
    pub fn set(name: &str, value: &str) -> Self {
        let value = match value {
            "true" | "True" => VariantValue::Bool(true),
            "false" | "False" => VariantValue::Bool(false),
            other => VariantValue::Choice(other.to_string()),
        };
        Self {
            name: name.to_string(),
            value,
        }
    }
}

impl fmt::Display for VariantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            VariantValue::Bool(true) => write!(f, "+{}", self.name),
            VariantValue::Bool(false) => write!(f, "~{}", self.name),
            VariantValue::Choice(v) => write!(f, " {}={v}", self.name),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parse variant requests such as `+debug~shared threads=multi`
pub fn parse_variant_requests(input: &str) -> Result<Vec<VariantRequest>, VariantError> {
    let mut requests = Vec::new();

    for word in input.split_whitespace() {
        if let Some((name, value)) = word.split_once('=') {
            if name.is_empty() || value.is_empty() || !name.chars().all(is_name_char) {
                return Err(VariantError::ParseError(word.to_string()));
            }
            requests.push(VariantRequest::set(name, value));
            continue;
        }

        let mut chars = word.chars().peekable();
        while let Some(sigil) = chars.next() {
            let enable = match sigil {
                '+' => true,
                '~' | '-' => false,
                _ => return Err(VariantError::ParseError(word.to_string())),
            };
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '+' || c == '~' || !is_name_char(c) {
                    break;
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(VariantError::ParseError(word.to_string()));
            }
            requests.push(if enable {
                VariantRequest::enable(&name)
            } else {
                VariantRequest::disable(&name)
            });
        }
    }

    Ok(requests)
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantSource {
    /// Explicitly requested for this package
    Request,
    /// Required by a dependent's dependency edge
    Inherited,
    /// Declared default
    Default,
}

/// Resolved variant values for one concrete spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSelection {
    recipe: String,
    values: BTreeMap<String, VariantValue>,
    #[serde(skip)]
    sources: BTreeMap<String, VariantSource>,
}

impl VariantSelection {
    /// Resolve every declared variant
    ///
    /// Unknown names and out-of-domain values in either request list are
    /// configuration errors.
    pub fn resolve(
        recipe: &str,
        definitions: &BTreeMap<String, VariantDef>,
        requested: &[VariantRequest],
        inherited: &[VariantRequest],
    ) -> Result<Self, VariantError> {
        for req in requested.iter().chain(inherited) {
            let def = definitions.get(&req.name).ok_or_else(|| VariantError::Unknown {
                recipe: recipe.to_string(),
                name: req.name.clone(),
            })?;
            def.validate(&req.name, &req.value)?;
        }

        let mut values = BTreeMap::new();
        let mut sources = BTreeMap::new();
        for (name, def) in definitions {
            // Last request for a name wins
            let find = |list: &[VariantRequest]| {
                list.iter().rev().find(|r| &r.name == name).map(|r| r.value.clone())
            };
            let (value, source) = if let Some(v) = find(requested) {
                (v, VariantSource::Request)
            } else if let Some(v) = find(inherited) {
                (v, VariantSource::Inherited)
            } else {
                (def.default.clone(), VariantSource::Default)
            };
            values.insert(name.clone(), value);
            sources.insert(name.clone(), source);
        }

        Ok(Self {
            recipe: recipe.to_string(),
            values,
            sources,
        })
    }

    /// Value of a declared variant
    pub fn value(&self, name: &str) -> Result<&VariantValue, VariantError> {
        self.values.get(name).ok_or_else(|| VariantError::Unknown {
            recipe: self.recipe.clone(),
            name: name.to_string(),
        })
    }

    /// Whether a boolean variant is on
    pub fn enabled(&self, name: &str) -> Result<bool, VariantError> {
        match self.value(name)? {
            VariantValue::Bool(b) => Ok(*b),
            VariantValue::Choice(got) => Err(VariantError::InvalidType {
                name: name.to_string(),
                expected: "boolean".to_string(),
                got: got.clone(),
            }),
        }
    }

    /// Selected value of an enumerated variant
    pub fn choice(&self, name: &str) -> Result<&str, VariantError> {
        match self.value(name)? {
            VariantValue::Choice(s) => Ok(s),
            VariantValue::Bool(b) => Err(VariantError::InvalidType {
                name: name.to_string(),
                expected: "choice".to_string(),
                got: b.to_string(),
            }),
        }
    }

    /// Where a value came from
    pub fn source(&self, name: &str) -> Option<VariantSource> {
        self.sources.get(name).copied()
    }

    /// Iterate over resolved values in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariantValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for VariantSelection {
    /// Canonical form: booleans first as `+a~b`, then ` key=value` pairs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.values {
            match value {
                VariantValue::Bool(true) => write!(f, "+{name}")?,
                VariantValue::Bool(false) => write!(f, "~{name}")?,
                VariantValue::Choice(_) => {}
            }
        }
        for (name, value) in &self.values {
            if let VariantValue::Choice(v) = value {
                write!(f, " {name}={v}")?;
            }
        }
        Ok(())
    }
}

/// How many members of a group may be installed into one prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoInstall {
    /// Any combination installs side by side
    Allowed,
    /// More than one member needs this variant (e.g. a tagged naming layout)
    RequiresVariant(String),
    /// At most one member
    Forbidden,
}

/// Constraint over a set of boolean variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantGroup {
    /// Group name used in messages
    pub name: String,
    /// Member variants, in declaration order
    pub members: Vec<String>,
    /// Reject an empty selection
    pub at_least_one: bool,
    /// Policy for selecting several members
    pub coinstall: CoInstall,
}

impl VariantGroup {
    /// Group where at least one member must be on
    pub fn at_least_one(name: &str, members: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            members: members.iter().map(ToString::to_string).collect(),
            at_least_one: true,
            coinstall: CoInstall::Allowed,
        }
    }

    /// Set the co-installation policy
    #[must_use]
    pub fn with_coinstall(mut self, coinstall: CoInstall) -> Self {
        self.coinstall = coinstall;
        self
    }

    /// Validate a selection, returning the enabled members in order
    pub fn check(&self, selection: &VariantSelection) -> Result<Vec<String>, VariantError> {
        let mut selected = Vec::new();
        for member in &self.members {
            if selection.enabled(member)? {
                selected.push(member.clone());
            }
        }

        if selected.is_empty() && self.at_least_one {
            return Err(VariantError::EmptyGroup {
                group: self.name.clone(),
                members: self.members.clone(),
            });
        }

        if selected.len() > 1 {
            match &self.coinstall {
                CoInstall::Allowed => {}
                CoInstall::Forbidden => {
                    return Err(VariantError::UnsupportedCombination {
                        group: self.name.clone(),
                        selected,
                        reason: "only one may be installed".to_string(),
                    });
                }
                CoInstall::RequiresVariant(layout) => {
                    if !selection.enabled(layout)? {
                        return Err(VariantError::UnsupportedCombination {
                            group: self.name.clone(),
                            selected,
                            reason: format!("co-installation requires +{layout}"),
                        });
                    }
                }
            }
        }

        Ok(selected)
    }
}
