//! Conversion between [`Routine`] trees and the external declarative schema.
//!
//! The schema stores every expression as text (or a bare number) and uses
//! lists where the in-memory tree uses maps. This module only converts; it
//! does not validate the schema beyond what is needed to build a tree.
//!
//! ```json
//! {
//!   "name": "root",
//!   "type": "qft",
//!   "ports": [{ "name": "in_0", "direction": "input", "size": "N" }],
//!   "resources": [{ "name": "T_gates", "type": "additive", "value": "2*N" }],
//!   "input_params": ["N"],
//!   "linked_params": [{ "source": "N", "targets": ["child.N"] }],
//!   "children": [],
//!   "connections": [{ "source": "in_0", "target": "child.in_0" }]
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::routine::{
    Connection, Constraint, ConstraintStatus, Port, PortDirection, Resource, ResourceType, Routine,
};
use crate::errors::{Error, Result};
use crate::symbolics::{Literal, SymbolicBackend};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSchema {
    pub name: String,
    pub direction: PortDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Literal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub value: Literal,
}

/// One parent parameter and the `child.param` paths it feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSchema {
    pub source: String,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSchema {
    pub lhs: Literal,
    pub rhs: Literal,
    #[serde(default)]
    pub status: ConstraintStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineSchema {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub routine_type: Option<String>,

    #[serde(default)]
    pub ports: Vec<PortSchema>,

    #[serde(default)]
    pub resources: Vec<ResourceSchema>,

    #[serde(default)]
    pub input_params: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_variables: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_params: Vec<LinkSchema>,

    #[serde(default)]
    pub children: Vec<RoutineSchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintSchema>,
}

impl RoutineSchema {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<E> Routine<E> {
    /// Export this tree to the schema, rendering expressions with `backend`.
    pub fn to_schema<B>(&self, backend: &B) -> RoutineSchema
    where
        B: SymbolicBackend<Expr = E>,
    {
        let render = |expr: &E| Literal::Text(backend.serialize(expr));
        RoutineSchema {
            name: self.name.clone(),
            routine_type: self.routine_type.clone(),
            ports: self
                .ports
                .values()
                .map(|port| PortSchema {
                    name: port.name.clone(),
                    direction: port.direction,
                    size: Some(render(&port.size)),
                })
                .collect(),
            resources: self
                .resources
                .values()
                .map(|resource| ResourceSchema {
                    name: resource.name.clone(),
                    resource_type: resource.resource_type,
                    value: render(&resource.value),
                })
                .collect(),
            input_params: self.input_params.clone(),
            local_variables: self.local_variables.clone(),
            linked_params: self
                .linked_params
                .iter()
                .map(|(source, targets)| LinkSchema {
                    source: source.clone(),
                    targets: targets
                        .iter()
                        .map(|(child, param)| format!("{}.{}", child, param))
                        .collect(),
                })
                .collect(),
            children: self.children.values().map(|child| child.to_schema(backend)).collect(),
            connections: self.connections.clone(),
            constraints: self
                .constraints
                .iter()
                .map(|constraint| ConstraintSchema {
                    lhs: render(&constraint.lhs),
                    rhs: render(&constraint.rhs),
                    status: constraint.status,
                })
                .collect(),
        }
    }

    /// Build a tree from the schema, parsing expressions with `backend`.
    pub fn from_schema<B>(schema: &RoutineSchema, backend: &B) -> Result<Self>
    where
        B: SymbolicBackend<Expr = E>,
    {
        let parse = |location: String, value: &Literal| {
            backend
                .as_expression(value)
                .map_err(|source| Error::Schema { location, source })
        };

        let mut routine = Routine::new(schema.name.clone())
            .with_input_params(schema.input_params.iter().cloned());
        routine.routine_type = schema.routine_type.clone();
        routine.local_variables = schema.local_variables.clone();
        routine.connections = schema.connections.clone();

        for port in &schema.ports {
            let location = format!("{}#ports.{}", schema.name, port.name);
            let size = match &port.size {
                Some(size) => parse(location, size)?,
                None => parse(location, &Literal::Text(default_port_size(&schema.name, port)))?,
            };
            routine = routine.with_port(Port::new(port.name.clone(), port.direction, size));
        }

        for resource in &schema.resources {
            let location = format!("{}#resources.{}", schema.name, resource.name);
            let value = parse(location, &resource.value)?;
            routine = routine.with_resource(Resource::new(
                resource.name.clone(),
                resource.resource_type,
                value,
            ));
        }

        for (i, constraint) in schema.constraints.iter().enumerate() {
            let location = format!("{}#constraints.{}", schema.name, i);
            let mut parsed = Constraint::new(
                parse(location.clone(), &constraint.lhs)?,
                parse(location, &constraint.rhs)?,
            );
            parsed.status = constraint.status;
            routine = routine.with_constraint(parsed);
        }

        for link in &schema.linked_params {
            for target in &link.targets {
                let (child, param) = target.split_once('.').ok_or_else(|| Error::InvalidLink {
                    routine: schema.name.clone(),
                    target: target.clone(),
                })?;
                routine = routine.with_link(link.source.clone(), child, param);
            }
        }

        for child in &schema.children {
            routine = routine.with_child(Routine::from_schema(child, backend)?);
        }

        Ok(routine)
    }
}

/// Symbol standing in for a port whose size the schema leaves open.
fn default_port_size(routine: &str, port: &PortSchema) -> String {
    match port.direction {
        PortDirection::Input => format!("{}.{}", routine, port.name),
        PortDirection::Output | PortDirection::Through => port.name.clone(),
    }
}
