//! Dependency resolution
//!
//! Turns a spec request (`name@version+variant`) into a [`BuildPlan`]:
//! every reachable recipe pinned to a version and variant selection, each
//! with its installation prefix, in an order where dependencies come
//! before dependents.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::recipe::UsageKind;
use crate::core::repository::Repository;
use crate::core::spec::{Compiler, ConcreteSpec, Platform, Prefix, ResolvedDependency};
use crate::core::variants::{parse_variant_requests, VariantRequest, VariantSelection, VariantValue};
use crate::core::version::RecipeVersion;
use crate::error::{HpcPrereqsError, RecipeError, ResolverError};

/// Dependency graph for packages
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Adjacency list: package -> dependencies, in declaration order
    edges: BTreeMap<String, Vec<String>>,
    /// All known packages, in insertion order
    nodes: Vec<String>,
    known: BTreeSet<String>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_node(&mut self, name: &str) {
        if self.known.insert(name.to_string()) {
            self.nodes.push(name.to_string());
        }
    }

    /// Add a package to the graph
    pub fn add_package(&mut self, name: &str, dependencies: Vec<String>) {
        self.insert_node(name);
        for dep in &dependencies {
            self.insert_node(dep);
        }
        self.edges.insert(name.to_string(), dependencies);
    }

    /// Compute topological sort (build order)
    ///
    /// Returns packages in order such that dependencies come before
    /// dependents. Traversal follows insertion and declaration order, so
    /// the result is deterministic.
    pub fn topological_sort(&self) -> Result<Vec<String>, ResolverError> {
        let mut visited = BTreeSet::new();
        let mut temp_visited = BTreeSet::new();
        let mut result = Vec::new();
        let mut cycle_path = Vec::new();

        for node in &self.nodes {
            if !visited.contains(node) {
                self.visit(
                    node,
                    &mut visited,
                    &mut temp_visited,
                    &mut result,
                    &mut cycle_path,
                )?;
            }
        }

        Ok(result)
    }

    fn visit(
        &self,
        node: &str,
        visited: &mut BTreeSet<String>,
        temp_visited: &mut BTreeSet<String>,
        result: &mut Vec<String>,
        cycle_path: &mut Vec<String>,
    ) -> Result<(), ResolverError> {
        if temp_visited.contains(node) {
            cycle_path.push(node.to_string());
            let start = cycle_path.iter().position(|n| n == node).unwrap_or(0);
            return Err(ResolverError::CircularDependency {
                cycle: cycle_path[start..].to_vec(),
            });
        }

        if visited.contains(node) {
            return Ok(());
        }

        temp_visited.insert(node.to_string());
        cycle_path.push(node.to_string());

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                self.visit(dep, visited, temp_visited, result, cycle_path)?;
            }
        }

        cycle_path.pop();
        temp_visited.remove(node);
        visited.insert(node.to_string());
        result.push(node.to_string());

        Ok(())
    }

    /// Check if the graph has any cycles
    pub fn has_cycle(&self) -> bool {
        self.topological_sort().is_err()
    }

    /// Every package that transitively depends on `name`
    pub fn dependents_of(&self, name: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut frontier = vec![name.to_string()];
        while let Some(current) = frontier.pop() {
            for (pkg, deps) in &self.edges {
                if deps.contains(&current) && found.insert(pkg.clone()) {
                    frontier.push(pkg.clone());
                }
            }
        }
        found
    }
}

/// A parsed `name[@version][+var][~var][ key=value]` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRequest {
    pub name: String,
    pub version: Option<String>,
    pub variants: Vec<VariantRequest>,
}

impl SpecRequest {
    /// Request for a recipe with no constraints
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: None,
            variants: Vec::new(),
        }
    }

    /// Parse a spec string
    pub fn parse(input: &str) -> Result<Self, RecipeError> {
        let input = input.trim();
        let invalid = |reason: &str| RecipeError::InvalidSpec {
            spec: input.to_string(),
            reason: reason.to_string(),
        };

        let name_end = input
            .find(|c: char| c == '@' || c == '+' || c == '~' || c.is_whitespace())
            .unwrap_or(input.len());
        let name = &input[..name_end];
        if name.is_empty() {
            return Err(invalid("missing package name"));
        }

        let mut rest = &input[name_end..];
        let mut version = None;
        if let Some(after) = rest.strip_prefix('@') {
            let end = after
                .find(|c: char| c == '+' || c == '~' || c.is_whitespace())
                .unwrap_or(after.len());
            if end == 0 {
                return Err(invalid("empty version after '@'"));
            }
            version = Some(after[..end].to_string());
            rest = &after[end..];
        }

        let variants = parse_variant_requests(rest).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            version,
            variants,
        })
    }
}

impl FromStr for SpecRequest {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SpecRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(v) = &self.version {
            write!(f, "@{v}")?;
        }
        for req in &self.variants {
            write!(f, "{req}")?;
        }
        Ok(())
    }
}

/// A recipe scheduled for building
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBuild {
    pub spec: ConcreteSpec,
    pub prefix: Prefix,
}

/// Concretized request
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Requested package
    pub root: String,
    /// Recipes in build order
    pub builds: Vec<PlannedBuild>,
    /// Packages provided from outside, by name
    pub externals: BTreeMap<String, Prefix>,
    graph_edges: BTreeMap<String, Vec<String>>,
}

impl BuildPlan {
    /// Build order by name
    pub fn order(&self) -> Vec<&str> {
        self.builds.iter().map(|b| b.spec.name.as_str()).collect()
    }

    /// Planned build for `name`
    pub fn get(&self, name: &str) -> Option<&PlannedBuild> {
        self.builds.iter().find(|b| b.spec.name == name)
    }

    /// Dependency graph of the plan (externals included as leaves)
    pub fn graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for build in &self.builds {
            let deps = self.graph_edges.get(&build.spec.name).cloned().unwrap_or_default();
            graph.add_package(&build.spec.name, deps);
        }
        graph
    }
}

/// One resolved package before prefixes are assigned
#[derive(Debug, Clone)]
enum Node {
    Recipe {
        version: RecipeVersion,
        variants: VariantSelection,
        edges: Vec<(String, UsageKind)>,
    },
    External(Prefix),
}

/// Variant requirements gathered from dependency edges: value and requester
type Inherited = BTreeMap<String, BTreeMap<String, (VariantValue, String)>>;

/// Upper bound on re-resolution passes
const MAX_PASSES: usize = 16;

/// Resolves spec requests against a recipe repository
#[derive(Debug)]
pub struct Concretizer<'r> {
    repo: &'r Repository,
    platform: Platform,
    compiler: Compiler,
    install_root: PathBuf,
    externals: BTreeMap<String, PathBuf>,
}

impl<'r> Concretizer<'r> {
    pub fn new(
        repo: &'r Repository,
        platform: Platform,
        compiler: Compiler,
        install_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo,
            platform,
            compiler,
            install_root: install_root.into(),
            externals: BTreeMap::new(),
        }
    }

    /// Packages installed outside this tool
    #[must_use]
    pub fn with_externals(mut self, externals: BTreeMap<String, PathBuf>) -> Self {
        self.externals = externals;
        self
    }

    /// Concretize a request into a build plan
    ///
    /// Variant validation runs here, before anything is built.
    pub fn concretize(&self, request: &SpecRequest) -> Result<BuildPlan, HpcPrereqsError> {
        if self.externals.contains_key(&request.name) {
            return Err(RecipeError::InvalidSpec {
                spec: request.to_string(),
                reason: "package is configured as external".to_string(),
            }
            .into());
        }
        self.repo.get(&request.name)?;

        // Edge variant requirements can switch conditional edges on or off,
        // so resolve until the inherited requirements stop changing.
        let mut inherited = Inherited::new();
        let mut passes = 0;
        let (nodes, order) = loop {
            let (nodes, order, next) = self.resolve_pass(request, &inherited)?;
            if next == inherited {
                break (nodes, order);
            }
            passes += 1;
            if passes >= MAX_PASSES {
                return Err(ResolverError::Conflict {
                    message: format!("variant requirements for '{}' do not settle", request.name),
                }
                .into());
            }
            inherited = next;
        };

        let mut graph = DependencyGraph::new();
        let mut graph_edges = BTreeMap::new();
        for name in &order {
            if let Some(Node::Recipe { edges, .. }) = nodes.get(name) {
                let deps: Vec<String> = edges.iter().map(|(d, _)| d.clone()).collect();
                graph.add_package(name, deps.clone());
                graph_edges.insert(name.clone(), deps);
            }
        }
        let sorted = graph.topological_sort()?;

        let mut builds: Vec<PlannedBuild> = Vec::new();
        let mut externals = BTreeMap::new();
        let mut hashes: BTreeMap<String, (Prefix, String)> = BTreeMap::new();
        for name in &sorted {
            match nodes.get(name) {
                Some(Node::External(prefix)) => {
                    let hash = short_hash(&prefix.to_string());
                    hashes.insert(name.clone(), (prefix.clone(), hash));
                    externals.insert(name.clone(), prefix.clone());
                }
                Some(Node::Recipe {
                    version,
                    variants,
                    edges,
                }) => {
                    let mut dependencies = Vec::new();
                    for (dep, kind) in edges {
                        let (prefix, hash) =
                            hashes.get(dep).ok_or_else(|| ResolverError::MissingDependency {
                                package: name.clone(),
                                dependency: dep.clone(),
                            })?;
                        dependencies.push(ResolvedDependency {
                            name: dep.clone(),
                            kind: *kind,
                            prefix: prefix.clone(),
                            hash: hash.clone(),
                        });
                    }
                    let spec = ConcreteSpec {
                        name: name.clone(),
                        version: version.clone(),
                        variants: variants.clone(),
                        platform: self.platform.clone(),
                        compiler: self.compiler.clone(),
                        dependencies,
                    };
                    self.repo.get(name)?.validate(&spec)?;

                    let prefix = Prefix::new(self.install_root.join(spec.prefix_dir_name()));
                    hashes.insert(name.clone(), (prefix.clone(), spec.dag_hash()));
                    builds.push(PlannedBuild { spec, prefix });
                }
                None => {}
            }
        }

        tracing::debug!(
            "Concretized {} into {} builds, {} externals",
            request,
            builds.len(),
            externals.len()
        );

        Ok(BuildPlan {
            root: request.name.clone(),
            builds,
            externals,
            graph_edges,
        })
    }

    /// One depth-first resolution pass from the root
    fn resolve_pass(
        &self,
        request: &SpecRequest,
        inherited: &Inherited,
    ) -> Result<(BTreeMap<String, Node>, Vec<String>, Inherited), HpcPrereqsError> {
        let mut state = PassState::default();
        self.visit(&request.name, None, request, inherited, &mut state)?;
        Ok((state.nodes, state.order, state.next))
    }

    fn visit(
        &self,
        name: &str,
        parent: Option<&str>,
        request: &SpecRequest,
        inherited: &Inherited,
        state: &mut PassState,
    ) -> Result<(), HpcPrereqsError> {
        if let Some(pos) = state.stack.iter().position(|n| n == name) {
            let mut cycle = state.stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(ResolverError::CircularDependency { cycle }.into());
        }
        if state.nodes.contains_key(name) {
            return Ok(());
        }

        if let Some(path) = self.externals.get(name) {
            state
                .nodes
                .insert(name.to_string(), Node::External(Prefix::new(path.clone())));
            state.order.push(name.to_string());
            return Ok(());
        }

        let recipe = match self.repo.get(name) {
            Ok(recipe) => recipe,
            Err(e) => {
                return Err(match parent {
                    Some(parent) => ResolverError::MissingDependency {
                        package: parent.to_string(),
                        dependency: name.to_string(),
                    }
                    .into(),
                    None => e.into(),
                })
            }
        };
        let def = recipe.definition();

        let is_root = name == request.name;
        let version = match (&request.version, is_root) {
            (Some(v), true) => def.find_version(v)?.version.clone(),
            _ => def.default_version()?.version.clone(),
        };

        let explicit: &[VariantRequest] = if is_root { &request.variants } else { &[] };
        let from_edges: Vec<VariantRequest> = inherited
            .get(name)
            .map(|reqs| {
                reqs.iter()
                    .map(|(var, (value, _))| VariantRequest {
                        name: var.clone(),
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        for req in explicit {
            if let Some(inh) = from_edges.iter().find(|r| r.name == req.name && r.value != req.value) {
                return Err(ResolverError::Conflict {
                    message: format!("'{name}' requested with {req} but a dependent requires {inh}"),
                }
                .into());
            }
        }
        let variants = VariantSelection::resolve(name, &def.variants, explicit, &from_edges)?;

        let mut edges = Vec::new();
        for dep in &def.dependencies {
            if !dep.when.holds(&version, &variants, &self.platform)? {
                continue;
            }
            if edges.iter().any(|(d, _): &(String, UsageKind)| d == &dep.name) {
                continue;
            }
            for req in &dep.variants {
                let entry = state.next.entry(dep.name.clone()).or_default();
                match entry.get(&req.name) {
                    Some((value, from)) if value != &req.value => {
                        return Err(ResolverError::Conflict {
                            message: format!(
                                "'{from}' and '{name}' require different values of '{}' on '{}'",
                                req.name, dep.name
                            ),
                        }
                        .into());
                    }
                    Some(_) => {}
                    None => {
                        entry.insert(req.name.clone(), (req.value.clone(), name.to_string()));
                    }
                }
            }
            edges.push((dep.name.clone(), dep.kind));
        }

        state.stack.push(name.to_string());
        for (dep, _) in &edges {
            self.visit(dep, Some(name), request, inherited, state)?;
        }
        state.stack.pop();

        state.nodes.insert(
            name.to_string(),
            Node::Recipe {
                version,
                variants,
                edges,
            },
        );
        state.order.push(name.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct PassState {
    nodes: BTreeMap<String, Node>,
    order: Vec<String>,
    stack: Vec<String>,
    next: Inherited,
}

fn short_hash(input: &str) -> String {
    let digest = hex::encode(Sha256::digest(input.as_bytes()));
    digest[..8].to_string()
}
