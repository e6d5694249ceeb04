//! Pattern matching and creation over the store.

use super::expr::equals;
use super::{Datum, InterpretError, InterpretResult, Interpreter, Row};
use crate::query::plan::{Expr, Hop, NodePattern, Pattern, PatternDirection, RelPattern};
use neoql_common::types::Value;
use neoql_core::graph::Direction;
use neoql_core::graph::lpg::{EdgeId, NodeId};

/// Evaluated inline property constraints.
type Constraints = Vec<(String, Datum)>;

impl Interpreter<'_> {
    /// Every binding of `pattern` extending `row`, in store order.
    ///
    /// Bound variables constrain the match; a relationship is not used
    /// twice within one path.
    pub(super) fn match_pattern(&self, pattern: &Pattern, row: &Row) -> InterpretResult<Vec<Row>> {
        let start = self.constraints(&pattern.start.properties, row)?;
        let hops = pattern
            .hops
            .iter()
            .map(|hop| {
                Ok((
                    self.constraints(&hop.rel.properties, row)?,
                    self.constraints(&hop.node.properties, row)?,
                ))
            })
            .collect::<InterpretResult<Vec<_>>>()?;

        let mut out = Vec::new();
        for node in self.candidates(&pattern.start, row)? {
            if !self.node_matches(node, &pattern.start, &start) {
                continue;
            }
            let mut bound = row.clone();
            if let Some(var) = &pattern.start.var {
                bound.insert(var.name().to_string(), Datum::Node(node));
            }
            self.expand(&pattern.hops, &hops, node, bound, &mut Vec::new(), &mut out)?;
        }
        Ok(out)
    }

    /// Creates the unbound parts of `pattern` and binds their variables.
    pub(super) fn create_pattern(&self, pattern: &Pattern, row: &mut Row) -> InterpretResult<()> {
        let mut current = self.create_node(&pattern.start, row)?;
        for Hop { rel, node } in &pattern.hops {
            let next = self.create_node(node, row)?;
            let (src, dst) = match rel.direction {
                PatternDirection::In => (next, current),
                PatternDirection::Out | PatternDirection::Both => (current, next),
            };
            let properties = self.property_values(&rel.properties, row)?;
            let edge = self
                .store
                .create_edge_with_props(src, dst, &rel.rel_type, properties)?;
            if let Some(var) = &rel.var {
                row.insert(var.name().to_string(), Datum::Edge(edge));
            }
            current = next;
        }
        Ok(())
    }

    fn create_node(&self, pattern: &NodePattern, row: &mut Row) -> InterpretResult<NodeId> {
        if let Some(var) = &pattern.var {
            match row.get(var.name()) {
                Some(Datum::Node(id)) => return Ok(*id),
                Some(other) => {
                    return Err(InterpretError::TypeMismatch {
                        expected: "node",
                        found: other.describe(),
                    });
                }
                None => {}
            }
        }
        let labels: Vec<&str> = pattern.labels.iter().map(String::as_str).collect();
        let properties = self.property_values(&pattern.properties, row)?;
        let id = self.store.create_node_with_props(&labels, properties);
        if let Some(var) = &pattern.var {
            row.insert(var.name().to_string(), Datum::Node(id));
        }
        Ok(id)
    }

    fn property_values(&self, properties: &[(String, Expr)], row: &Row) -> InterpretResult<Vec<(String, Value)>> {
        let mut out = Vec::with_capacity(properties.len());
        for (key, expr) in properties {
            let value = self.eval(expr, row, None)?.to_value(self.store);
            if !value.is_null() {
                out.push((key.clone(), value));
            }
        }
        Ok(out)
    }

    fn constraints(&self, properties: &[(String, Expr)], row: &Row) -> InterpretResult<Constraints> {
        properties
            .iter()
            .map(|(key, expr)| Ok((key.clone(), self.eval(expr, row, None)?)))
            .collect()
    }

    fn candidates(&self, pattern: &NodePattern, row: &Row) -> InterpretResult<Vec<NodeId>> {
        if let Some(var) = &pattern.var {
            match row.get(var.name()) {
                Some(Datum::Node(id)) => return Ok(vec![*id]),
                Some(d) if d.is_null() => return Ok(Vec::new()),
                Some(other) => {
                    return Err(InterpretError::TypeMismatch {
                        expected: "node",
                        found: other.describe(),
                    });
                }
                None => {}
            }
        }
        Ok(match pattern.labels.first() {
            Some(label) => self.store.nodes_by_label(label),
            None => self.store.node_ids(),
        })
    }

    fn node_matches(&self, node: NodeId, pattern: &NodePattern, constraints: &Constraints) -> bool {
        pattern.labels.iter().all(|l| self.store.has_label(node, l))
            && constraints.iter().all(|(key, expected)| {
                let actual = self
                    .store
                    .node_property(node, key)
                    .map_or(Datum::NULL, |v| Datum::from_value(&v));
                equals(&actual, expected) == Some(true)
            })
    }

    fn edge_matches(&self, edge: EdgeId, constraints: &Constraints) -> bool {
        constraints.iter().all(|(key, expected)| {
            let actual = self
                .store
                .edge_property(edge, key)
                .map_or(Datum::NULL, |v| Datum::from_value(&v));
            equals(&actual, expected) == Some(true)
        })
    }

    fn expand(
        &self,
        hops: &[Hop],
        constraints: &[(Constraints, Constraints)],
        from: NodeId,
        row: Row,
        used: &mut Vec<EdgeId>,
        out: &mut Vec<Row>,
    ) -> InterpretResult<()> {
        let (Some(hop), Some((rel_constraints, node_constraints))) = (hops.first(), constraints.first()) else {
            out.push(row);
            return Ok(());
        };
        for (edge, next) in self.steps(from, &hop.rel, &row)? {
            if used.contains(&edge) || !self.edge_matches(edge, rel_constraints) {
                continue;
            }
            if !self.node_matches(next, &hop.node, node_constraints) {
                continue;
            }
            if let Some(var) = &hop.node.var {
                match row.get(var.name()) {
                    Some(Datum::Node(bound)) if *bound != next => continue,
                    Some(Datum::Node(_)) | None => {}
                    Some(_) => continue,
                }
            }
            let mut extended = row.clone();
            if let Some(var) = &hop.rel.var {
                extended.insert(var.name().to_string(), Datum::Edge(edge));
            }
            if let Some(var) = &hop.node.var {
                extended.insert(var.name().to_string(), Datum::Node(next));
            }
            used.push(edge);
            self.expand(&hops[1..], &constraints[1..], next, extended, used, out)?;
            used.pop();
        }
        Ok(())
    }

    /// Edges leaving `from` along `rel`, with the node each leads to.
    fn steps(&self, from: NodeId, rel: &RelPattern, row: &Row) -> InterpretResult<Vec<(EdgeId, NodeId)>> {
        let direction = match rel.direction {
            PatternDirection::Out => Direction::Outgoing,
            PatternDirection::In => Direction::Incoming,
            PatternDirection::Both => Direction::Both,
        };
        let bound = match rel.var.as_ref().and_then(|v| row.get(v.name())) {
            Some(Datum::Edge(id)) => Some(*id),
            Some(d) if d.is_null() => return Ok(Vec::new()),
            Some(other) => {
                return Err(InterpretError::TypeMismatch {
                    expected: "relationship",
                    found: other.describe(),
                });
            }
            None => None,
        };
        let mut steps = Vec::new();
        for id in self.store.edges_of(from, direction) {
            if bound.is_some_and(|b| b != id) {
                continue;
            }
            let Some(edge) = self.store.get_edge(id) else {
                continue;
            };
            if *edge.edge_type != *rel.rel_type {
                continue;
            }
            let next = match rel.direction {
                PatternDirection::Out => edge.dst,
                PatternDirection::In => edge.src,
                PatternDirection::Both => edge.other(from),
            };
            steps.push((id, next));
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::Var;
    use neoql_core::graph::lpg::LpgStore;

    fn rel(var: Option<&Var>, rel_type: &str, direction: PatternDirection) -> RelPattern {
        RelPattern {
            var: var.cloned(),
            rel_type: rel_type.to_string(),
            direction,
            properties: Vec::new(),
        }
    }

    fn cast() -> (LpgStore, NodeId, NodeId, NodeId) {
        let store = LpgStore::new();
        let heat = store.create_node_with_props(&["Movie"], [("title", "Heat")]);
        let ronin = store.create_node_with_props(&["Movie"], [("title", "Ronin")]);
        let al = store.create_node_with_props(&["Actor"], [("name", "Al")]);
        store.create_edge_with_props(al, heat, "ACTED_IN", [("role", "Vincent")]).unwrap();
        store.create_edge(al, ronin, "ACTED_IN").unwrap();
        (store, heat, ronin, al)
    }

    #[test]
    fn test_match_directions() {
        let (store, heat, ronin, al) = cast();
        let interpreter = Interpreter::new(&store);
        let (movie, actor) = (Var::new("m"), Var::new("a"));
        let incoming = Pattern::node(NodePattern::labeled(&movie, &["Movie".to_string()]))
            .hop(rel(None, "ACTED_IN", PatternDirection::In), NodePattern::var(&actor));
        let rows = interpreter.match_pattern(&incoming, &Row::new()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("m"), Some(&Datum::Node(heat)));
        assert_eq!(rows[1].get("m"), Some(&Datum::Node(ronin)));
        assert!(rows.iter().all(|r| r.get("a") == Some(&Datum::Node(al))));

        let outgoing = Pattern::node(NodePattern::labeled(&movie, &["Movie".to_string()]))
            .hop(rel(None, "ACTED_IN", PatternDirection::Out), NodePattern::var(&actor));
        assert!(interpreter.match_pattern(&outgoing, &Row::new()).unwrap().is_empty());

        let both = Pattern::node(NodePattern::labeled(&movie, &["Movie".to_string()]))
            .hop(rel(None, "ACTED_IN", PatternDirection::Both), NodePattern::var(&actor));
        assert_eq!(interpreter.match_pattern(&both, &Row::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_match_respects_bindings_and_properties() {
        let (store, heat, _, al) = cast();
        let interpreter = Interpreter::new(&store);
        let (movie, actor, edge) = (Var::new("m"), Var::new("a"), Var::new("e"));
        let mut with_role = rel(Some(&edge), "ACTED_IN", PatternDirection::Out);
        with_role.properties.push(("role".to_string(), Expr::string("Vincent")));
        let pattern = Pattern::node(NodePattern::var(&actor)).hop(with_role, NodePattern::var(&movie));
        let row = Row::from([("a".to_string(), Datum::Node(al))]);
        let rows = interpreter.match_pattern(&pattern, &row).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("m"), Some(&Datum::Node(heat)));
        assert!(matches!(rows[0].get("e"), Some(Datum::Edge(_))));

        let unbound = Row::from([("a".to_string(), Datum::NULL)]);
        assert!(interpreter.match_pattern(&pattern, &unbound).unwrap().is_empty());
    }

    #[test]
    fn test_create_reuses_bound_nodes() {
        let (store, heat, _, _) = cast();
        let interpreter = Interpreter::new(&store);
        let (movie, person, edge) = (Var::new("m"), Var::new("p"), Var::new("e"));
        let mut person_node = NodePattern::labeled(&person, &["Person".to_string()]);
        person_node.properties.push(("name".to_string(), Expr::string("Michael")));
        let pattern = Pattern::node(NodePattern::var(&movie))
            .hop(rel(Some(&edge), "DIRECTED", PatternDirection::In), person_node);
        let mut row = Row::from([("m".to_string(), Datum::Node(heat))]);
        interpreter.create_pattern(&pattern, &mut row).unwrap();

        assert_eq!(store.node_count(), 4);
        let Some(Datum::Node(michael)) = row.get("p") else {
            panic!("Expected p to be bound");
        };
        assert_eq!(store.node_property(*michael, "name"), Some(Value::from("Michael")));
        let Some(Datum::Edge(id)) = row.get("e") else {
            panic!("Expected e to be bound");
        };
        let created = store.get_edge(*id).unwrap();
        assert_eq!((created.src, created.dst), (*michael, heat));
    }
}
