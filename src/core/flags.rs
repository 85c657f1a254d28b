//! Compiler flag composition
//!
//! A recipe's flag hook receives the flags the host wants for one category
//! and decides where they go:
//!
//! - [`FlagPlacement::Inject`] - left to the host's compiler wrapper (untouched)
//! - [`FlagPlacement::Environment`] - exported as `CFLAGS`-style variables
//! - [`FlagPlacement::BuildSystem`] - appended to the build tool's arguments
//!
//! [`FlagPolicy`] captures the handful of rules recipes actually use:
//! default-fill when empty, force `-g`, add an optimisation level unless one
//! is present, and append required flags once. Applying a policy to its own
//! output returns the same flags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RecipeError;

/// Flag category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagCategory {
    CFlags,
    CxxFlags,
    FFlags,
    CppFlags,
    LdFlags,
    LdLibs,
}

impl FlagCategory {
    /// All categories in the order the host processes them
    pub const ALL: [FlagCategory; 6] = [
        Self::CFlags,
        Self::CxxFlags,
        Self::FFlags,
        Self::CppFlags,
        Self::LdFlags,
        Self::LdLibs,
    ];

    /// Environment variable consumed by build tools
    pub fn env_var(self) -> &'static str {
        match self {
            Self::CFlags => "CFLAGS",
            Self::CxxFlags => "CXXFLAGS",
            Self::FFlags => "FFLAGS",
            Self::CppFlags => "CPPFLAGS",
            Self::LdFlags => "LDFLAGS",
            Self::LdLibs => "LDLIBS",
        }
    }

    /// Variable a compiler wrapper reads injected flags from
    pub fn wrapper_var(self) -> String {
        format!("HPCPREREQS_{}", self.env_var())
    }
}

impl fmt::Display for FlagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.env_var().to_lowercase())
    }
}

impl FromStr for FlagCategory {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.env_var().eq_ignore_ascii_case(s))
            .ok_or_else(|| RecipeError::UnknownFlagCategory(s.to_string()))
    }
}

/// Where a category's flags end up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "placement", content = "flags", rename_all = "snake_case")]
pub enum FlagPlacement {
    /// Passed through to the compiler wrapper
    Inject(Vec<String>),
    /// Exported into the build environment
    Environment(Vec<String>),
    /// Appended to the build tool invocation
    BuildSystem(Vec<String>),
}

impl FlagPlacement {
    /// The flags regardless of placement
    pub fn flags(&self) -> &[String] {
        match self {
            Self::Inject(f) | Self::Environment(f) | Self::BuildSystem(f) => f,
        }
    }

    /// Placement kind
    pub fn target(&self) -> FlagTarget {
        match self {
            Self::Inject(_) => FlagTarget::Inject,
            Self::Environment(_) => FlagTarget::Environment,
            Self::BuildSystem(_) => FlagTarget::BuildSystem,
        }
    }
}

/// Placement kind without flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagTarget {
    Inject,
    Environment,
    BuildSystem,
}

impl FlagTarget {
    fn place(self, flags: Vec<String>) -> FlagPlacement {
        match self {
            Self::Inject => FlagPlacement::Inject(flags),
            Self::Environment => FlagPlacement::Environment(flags),
            Self::BuildSystem => FlagPlacement::BuildSystem(flags),
        }
    }
}

/// Where a forced `-g` goes when missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugPosition {
    Front,
    Back,
}

/// Whether any optimisation level (`-O`, `-O0`, `-Os`, `-O3`, ...) is set
pub fn has_optimization(flags: &[String]) -> bool {
    flags.iter().any(|f| f.starts_with("-O"))
}

/// Flag rules for a single category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagPolicy {
    category: FlagCategory,
    target: FlagTarget,
    defaults: Vec<String>,
    debug: Option<DebugPosition>,
    optimization: Option<String>,
    forced: Vec<String>,
}

impl FlagPolicy {
    /// Policy for `category` that places flags at `target` unchanged
    pub fn new(category: FlagCategory, target: FlagTarget) -> Self {
        Self {
            category,
            target,
            defaults: Vec::new(),
            debug: None,
            optimization: None,
            forced: Vec::new(),
        }
    }

    /// Use `defaults` when the host passes no flags
    #[must_use]
    pub fn with_defaults(mut self, defaults: &[&str]) -> Self {
        self.defaults = defaults.iter().map(ToString::to_string).collect();
        self
    }

    /// Always carry `-g`
    #[must_use]
    pub fn ensure_debug(mut self, position: DebugPosition) -> Self {
        self.debug = Some(position);
        self
    }

    /// Append `level` unless some `-O*` flag is already present
    #[must_use]
    pub fn ensure_optimization(mut self, level: &str) -> Self {
        self.optimization = Some(level.to_string());
        self
    }

    /// Append `flag` unless already present
    #[must_use]
    pub fn force(mut self, flag: &str) -> Self {
        self.forced.push(flag.to_string());
        self
    }

    /// Category this policy governs
    pub fn category(&self) -> FlagCategory {
        self.category
    }

    /// Declared default flags
    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }

    /// Apply the policy
    ///
    /// Other categories pass through to the wrapper untouched. `extra` holds
    /// forced flags only known at build time, such as the compiler's PIC
    /// flag.
    pub fn apply(&self, category: FlagCategory, flags: Vec<String>, extra: &[&str]) -> FlagPlacement {
        if category != self.category {
            return FlagPlacement::Inject(flags);
        }

        let mut flags = if flags.is_empty() {
            self.defaults.clone()
        } else {
            flags
        };

        if let Some(position) = self.debug {
            if !flags.iter().any(|f| f == "-g") {
                match position {
                    DebugPosition::Front => flags.insert(0, "-g".to_string()),
                    DebugPosition::Back => flags.push("-g".to_string()),
                }
            }
        }

        if let Some(level) = &self.optimization {
            if !has_optimization(&flags) {
                flags.push(level.clone());
            }
        }

        for flag in self.forced.iter().map(String::as_str).chain(extra.iter().copied()) {
            if !flags.iter().any(|f| f == flag) {
                flags.push(flag.to_string());
            }
        }

        self.target.place(flags)
    }
}

/// Split a flag string on whitespace
pub fn split_flags(s: &str) -> Vec<String> {
    s.split_whitespace().map(ToString::to_string).collect()
}
