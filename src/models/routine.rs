//! Routine tree: the shared substrate of the evaluation and aggregation engines.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
    Through,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
            PortDirection::Through => write!(f, "through"),
        }
    }
}

/// How a resource composes when aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Contributions are summed
    Additive,
    /// Contributions are multiplied
    Multiplicative,
    /// Qubit counts (peak-style, not summed)
    Qubits,
    /// Carried along but never summed
    Other,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Additive => write!(f, "additive"),
            ResourceType::Multiplicative => write!(f, "multiplicative"),
            ResourceType::Qubits => write!(f, "qubits"),
            ResourceType::Other => write!(f, "other"),
        }
    }
}

/// A named wire the routine is connected to.
#[derive(Debug, Clone, PartialEq)]
pub struct Port<E> {
    pub name: String,
    pub direction: PortDirection,
    pub size: E,
}

impl<E> Port<E> {
    pub fn new(name: impl Into<String>, direction: PortDirection, size: E) -> Self {
        Port {
            name: name.into(),
            direction,
            size,
        }
    }
}

/// A named, typed cost quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<E> {
    pub name: String,
    pub resource_type: ResourceType,
    pub value: E,
}

impl<E> Resource<E> {
    pub fn new(name: impl Into<String>, resource_type: ResourceType, value: E) -> Self {
        Resource {
            name: name.into(),
            resource_type,
            value,
        }
    }

    pub fn additive(name: impl Into<String>, value: E) -> Self {
        Self::new(name, ResourceType::Additive, value)
    }

    pub fn is_additive(&self) -> bool {
        self.resource_type == ResourceType::Additive
    }
}

/// A directed edge between two ports (`port` or `child.port`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source: String,
    pub target: String,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Connection {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Whether a constraint is known to hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintStatus {
    #[default]
    Inconclusive,
    Satisfied,
    Violated,
}

/// An equality `lhs == rhs` the routine's parameters must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint<E> {
    pub lhs: E,
    pub rhs: E,
    pub status: ConstraintStatus,
}

impl<E> Constraint<E> {
    pub fn new(lhs: E, rhs: E) -> Self {
        Constraint {
            lhs,
            rhs,
            status: ConstraintStatus::Inconclusive,
        }
    }
}

/// A node of the routine hierarchy.
///
/// Children are owned exclusively by their parent and keyed by their (unique
/// among siblings) name. All maps are ordered, so traversal order and any
/// output derived from a routine are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Routine<E> {
    pub name: String,
    pub routine_type: Option<String>,
    pub ports: BTreeMap<String, Port<E>>,
    pub resources: BTreeMap<String, Resource<E>>,
    /// Parameters that must be supplied from outside, sorted.
    pub input_params: Vec<String>,
    /// `name = expression` assignments, in declaration order.
    pub local_variables: Vec<String>,
    /// Parent parameter -> `(child, child_param)` pairs it is forwarded to.
    pub linked_params: BTreeMap<String, Vec<(String, String)>>,
    pub children: BTreeMap<String, Routine<E>>,
    pub connections: Vec<Connection>,
    pub constraints: Vec<Constraint<E>>,
}

/// A routine whose local variables were already resolved into its ports and
/// resources. Only `input_params`, port sizes, resource values, constraints
/// and children change under evaluation.
pub type CompiledRoutine<E> = Routine<E>;

impl<E> Routine<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Routine {
            name: name.into(),
            routine_type: None,
            ports: BTreeMap::new(),
            resources: BTreeMap::new(),
            input_params: Vec::new(),
            local_variables: Vec::new(),
            linked_params: BTreeMap::new(),
            children: BTreeMap::new(),
            connections: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn with_type(mut self, routine_type: impl Into<String>) -> Self {
        self.routine_type = Some(routine_type.into());
        self
    }

    pub fn with_port(mut self, port: Port<E>) -> Self {
        self.ports.insert(port.name.clone(), port);
        self
    }

    pub fn with_resource(mut self, resource: Resource<E>) -> Self {
        self.resources.insert(resource.name.clone(), resource);
        self
    }

    /// Set the input parameters; stored sorted and deduplicated.
    pub fn with_input_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut params: Vec<String> = params.into_iter().map(Into::into).collect();
        params.sort();
        params.dedup();
        self.input_params = params;
        self
    }

    pub fn with_local_variable(mut self, assignment: impl Into<String>) -> Self {
        self.local_variables.push(assignment.into());
        self
    }

    pub fn with_link(
        mut self,
        param: impl Into<String>,
        child: impl Into<String>,
        child_param: impl Into<String>,
    ) -> Self {
        self.linked_params
            .entry(param.into())
            .or_default()
            .push((child.into(), child_param.into()));
        self
    }

    pub fn with_child(mut self, child: Routine<E>) -> Self {
        self.children.insert(child.name.clone(), child);
        self
    }

    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint<E>) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Resolve a dotted path relative to this routine (`"a.b"` is child `b` of child `a`).
    pub fn child_at(&self, path: &str) -> Option<&Routine<E>> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.')
            .try_fold(self, |node, name| node.children.get(name))
    }

    /// Depth-first, pre-order walk yielding `(dotted path, routine)`.
    ///
    /// Uses an explicit stack, so arbitrarily deep trees do not grow the call stack.
    pub fn walk(&self) -> Walk<'_, E> {
        Walk {
            stack: vec![(self.name.clone(), self)],
        }
    }

    /// Children in dataflow order.
    ///
    /// A child comes after every sibling with a connection into it; siblings
    /// not ordered by connections come out by name. Connections naming an
    /// unknown child are ignored.
    pub fn sorted_children(&self) -> Result<Vec<&Routine<E>>> {
        let mut predecessors: BTreeMap<&str, BTreeSet<&str>> = self
            .children
            .keys()
            .map(|name| (name.as_str(), BTreeSet::new()))
            .collect();
        for connection in &self.connections {
            let (Some((source, _)), Some((target, _))) =
                (connection.source.split_once('.'), connection.target.split_once('.'))
            else {
                continue;
            };
            if !self.children.contains_key(source) {
                continue;
            }
            if let Some(sources) = predecessors.get_mut(target) {
                sources.insert(source);
            }
        }

        let mut ready: BTreeSet<&str> = predecessors
            .iter()
            .filter(|(_, sources)| sources.is_empty())
            .map(|(name, _)| *name)
            .collect();
        let mut sorted = Vec::with_capacity(self.children.len());
        while let Some(name) = ready.pop_first() {
            predecessors.remove(name);
            for (other, sources) in predecessors.iter_mut() {
                if sources.remove(name) && sources.is_empty() {
                    ready.insert(*other);
                }
            }
            if let Some(child) = self.children.get(name) {
                sorted.push(child);
            }
        }

        if !predecessors.is_empty() {
            return Err(Error::CyclicConnections {
                routine: self.name.clone(),
                children: predecessors.keys().map(|name| name.to_string()).collect(),
            });
        }
        Ok(sorted)
    }
}

/// Iterator returned by [`Routine::walk`].
pub struct Walk<'a, E> {
    stack: Vec<(String, &'a Routine<E>)>,
}

impl<'a, E> Iterator for Walk<'a, E> {
    type Item = (String, &'a Routine<E>);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        // Reverse so children come out in name order.
        for child in node.children.values().rev() {
            self.stack.push((format!("{}.{}", path, child.name), child));
        }
        Some((path, node))
    }
}
