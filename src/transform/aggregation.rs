//! Resource aggregation.
//!
//! A decomposition table rewrites a resource into weighted contributions to
//! other resources: `control_ry -> {rotation: 2, CNOT: 2}` adds `2*control_ry`
//! to both `rotation` and `CNOT`. Targets that are themselves table keys are
//! expanded further until only primitive resources receive contributions.
//!
//! Every node is rewritten independently; contributions never cross node
//! boundaries. Within a node:
//!
//! 1. Every additive resource whose name is a table key is a seed.
//! 2. Each seed's rule is flattened into weights on primitive resources, by a
//!    depth-first walk that expands each table key once and reuses the result
//!    wherever the key is reached again.
//! 3. The seed's value times each flattened weight is summed into the
//!    primitive resource.
//!
//! A rule reaching a key that is still being expanded, or a node needing more
//! rule expansions than allowed, is reported as [`Error::CyclicAggregation`].

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::errors::{Error, Result};
use crate::models::{Resource, ResourceType, Routine};
use crate::symbolics::{Literal, SymbolicBackend};

/// Resource name -> (target resource name -> weight).
pub type DecompositionTable = BTreeMap<String, BTreeMap<String, Literal>>;

/// Rule expansions allowed per node before it is declared non-terminating.
pub const DEFAULT_MAX_REWRITE_STEPS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// Drop decomposed resources instead of keeping them as `other`.
    pub remove_decomposed: bool,
    pub max_rewrite_steps: usize,
    /// Aggregate sibling subtrees on the rayon pool.
    pub parallel: bool,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        AggregationSettings {
            remove_decomposed: true,
            max_rewrite_steps: DEFAULT_MAX_REWRITE_STEPS,
            parallel: true,
        }
    }
}

type Chain = SmallVec<[String; 4]>;

/// Table key -> (primitive resource -> accumulated weight).
type Flattened<E> = BTreeMap<String, BTreeMap<String, E>>;

/// Per-node expansion state.
struct Expansion<'p, E> {
    path: &'p str,
    flattened: Flattened<E>,
    /// Keys whose expansion is in progress, outermost first.
    stack: Chain,
    steps: usize,
}

/// A decomposition table with its weights parsed by a backend.
pub struct Aggregator<'b, B: SymbolicBackend> {
    backend: &'b B,
    rules: BTreeMap<String, Vec<(String, B::Expr)>>,
    settings: AggregationSettings,
}

impl<'b, B: SymbolicBackend> Aggregator<'b, B> {
    /// Parse every weight of `table` once.
    pub fn new(backend: &'b B, table: &DecompositionTable) -> Result<Self> {
        let rules = table
            .iter()
            .map(|(resource, targets)| {
                let targets = targets
                    .iter()
                    .map(|(target, weight)| {
                        backend
                            .parse_value(weight)
                            .map(|weight| (target.clone(), weight))
                            .map_err(|source| Error::InvalidWeight {
                                resource: resource.clone(),
                                target: target.clone(),
                                source,
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((resource.clone(), targets))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Aggregator {
            backend,
            rules,
            settings: AggregationSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: AggregationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn remove_decomposed(mut self, remove: bool) -> Self {
        self.settings.remove_decomposed = remove;
        self
    }

    pub fn max_rewrite_steps(mut self, steps: usize) -> Self {
        self.settings.max_rewrite_steps = steps;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.settings.parallel = parallel;
        self
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    /// Rewrite the resources of every node of `routine`.
    pub fn aggregate(&self, routine: &Routine<B::Expr>) -> Result<Routine<B::Expr>> {
        debug!(
            target: "routine_estimator::transform::aggregation",
            routine = %routine.name,
            rules = self.rules.len(),
            remove_decomposed = self.settings.remove_decomposed,
            "Aggregating resources"
        );
        self.aggregate_node(routine, &routine.name)
    }

    fn aggregate_node(&self, node: &Routine<B::Expr>, path: &str) -> Result<Routine<B::Expr>> {
        let resources = self.aggregate_resources(&node.resources, path)?;

        let aggregate_child = |(name, child): (&String, &Routine<B::Expr>)| {
            let child_path = format!("{}.{}", path, name);
            self.aggregate_node(child, &child_path)
                .map(|child| (name.clone(), child))
        };
        let children: Vec<Result<(String, Routine<B::Expr>)>> =
            if self.settings.parallel && node.children.len() > 1 {
                node.children.par_iter().map(aggregate_child).collect()
            } else {
                node.children.iter().map(aggregate_child).collect()
            };

        Ok(Routine {
            name: node.name.clone(),
            routine_type: node.routine_type.clone(),
            ports: node.ports.clone(),
            resources,
            input_params: node.input_params.clone(),
            local_variables: node.local_variables.clone(),
            linked_params: node.linked_params.clone(),
            children: children.into_iter().collect::<Result<_>>()?,
            connections: node.connections.clone(),
            constraints: node.constraints.clone(),
        })
    }

    /// Rewrite one node's decomposable resources into primitive ones.
    fn aggregate_resources(
        &self,
        resources: &BTreeMap<String, Resource<B::Expr>>,
        path: &str,
    ) -> Result<BTreeMap<String, Resource<B::Expr>>> {
        let seeds: Vec<&Resource<B::Expr>> = resources
            .values()
            .filter(|resource| resource.is_additive() && self.rules.contains_key(&resource.name))
            .collect();
        if seeds.is_empty() {
            return Ok(resources.clone());
        }

        let mut expansion = Expansion {
            path,
            flattened: Flattened::new(),
            stack: Chain::new(),
            steps: 0,
        };
        for seed in &seeds {
            self.flatten(&seed.name, &mut expansion)?;
        }
        trace!(target: "routine_estimator::transform::aggregation", %path, seeds = seeds.len(), steps = expansion.steps);

        let mut aggregated = resources.clone();
        for seed in &seeds {
            if self.settings.remove_decomposed {
                aggregated.remove(&seed.name);
            } else if let Some(original) = aggregated.get_mut(&seed.name) {
                original.resource_type = ResourceType::Other;
            }
        }

        for seed in &seeds {
            let Some(weights) = expansion.flattened.get(&seed.name) else {
                continue;
            };
            for (target, weight) in weights {
                let contribution = self.backend.mul(&seed.value, weight);
                match aggregated.get_mut(target) {
                    Some(existing) => {
                        existing.value = self.backend.add(&existing.value, &contribution);
                    }
                    None => {
                        aggregated.insert(target.clone(), Resource::additive(target.clone(), contribution));
                    }
                }
            }
        }

        Ok(aggregated)
    }

    /// Flatten the rule of table key `resource` into `expansion.flattened`.
    fn flatten(&self, resource: &str, expansion: &mut Expansion<'_, B::Expr>) -> Result<()> {
        if expansion.flattened.contains_key(resource) {
            return Ok(());
        }
        let Some(targets) = self.rules.get(resource) else {
            return Ok(());
        };

        expansion.stack.push(resource.to_string());
        let mut weights: BTreeMap<String, B::Expr> = BTreeMap::new();
        for (target, weight) in targets {
            expansion.steps += 1;
            if let Some(start) = expansion.stack.iter().position(|name| name == target) {
                return Err(cyclic(expansion.path, &expansion.stack[start..], target));
            }
            if expansion.steps > self.settings.max_rewrite_steps {
                return Err(cyclic(expansion.path, &expansion.stack, target));
            }
            trace!(target: "routine_estimator::transform::aggregation::step", path = %expansion.path, from = %resource, to = %target, steps = expansion.steps);

            if self.rules.contains_key(target) {
                self.flatten(target, expansion)?;
                if let Some(inner) = expansion.flattened.get(target) {
                    for (primitive, inner_weight) in inner {
                        self.accumulate(&mut weights, primitive, self.backend.mul(weight, inner_weight));
                    }
                }
            } else {
                self.accumulate(&mut weights, target, weight.clone());
            }
        }
        expansion.stack.pop();
        expansion.flattened.insert(resource.to_string(), weights);
        Ok(())
    }

    fn accumulate(&self, weights: &mut BTreeMap<String, B::Expr>, target: &str, weight: B::Expr) {
        match weights.get_mut(target) {
            Some(existing) => *existing = self.backend.add(existing, &weight),
            None => {
                weights.insert(target.to_string(), weight);
            }
        }
    }
}

fn cyclic(path: &str, chain: &[String], target: &str) -> Error {
    let mut chain = chain.to_vec();
    chain.push(target.to_string());
    Error::CyclicAggregation {
        routine: path.to_string(),
        chain,
    }
}

/// Aggregate `routine` with `table`, otherwise using default settings.
pub fn aggregate<B: SymbolicBackend>(
    routine: &Routine<B::Expr>,
    table: &DecompositionTable,
    backend: &B,
    remove_decomposed: bool,
) -> Result<Routine<B::Expr>> {
    Aggregator::new(backend, table)?
        .remove_decomposed(remove_decomposed)
        .aggregate(routine)
}
