//! Index-based dependency graph with DFS-coloring cycle detection.

use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::model::DependencyType;
use crate::store::Snapshot;

/// Incoming precedence edge of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Index of the predecessor.
    pub from: usize,
    pub kind: DependencyType,
    pub lag_min: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Tasks as dense indices plus predecessor lists.
///
/// Node order follows the snapshot's (sorted) task ids, so every traversal is
/// deterministic.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    preds: Vec<Vec<Edge>>,
}

impl DependencyGraph {
    /// Build the graph over every task of `snapshot`.
    ///
    /// # Errors
    /// `Reference` when a `depends_on` entry names an unknown task.
    pub fn build(snapshot: &Snapshot) -> Result<Self> {
        let ids: Vec<String> = snapshot.tasks.keys().cloned().collect();
        let index: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut preds = vec![Vec::new(); ids.len()];
        for (i, task) in snapshot.tasks.values().enumerate() {
            for dep in &task.depends_on {
                let from = *index.get(&dep.task_id).ok_or_else(|| CoreError::Reference {
                    task_id: task.id.clone(),
                    missing: dep.task_id.clone(),
                })?;
                preds[i].push(Edge {
                    from,
                    kind: dep.kind,
                    lag_min: dep.lag_min,
                });
            }
        }

        Ok(Self { ids, index, preds })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, node: usize) -> &str {
        &self.ids[node]
    }

    pub fn node(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn predecessors(&self, node: usize) -> &[Edge] {
        &self.preds[node]
    }

    /// Nodes ordered so every predecessor precedes its dependents.
    ///
    /// # Errors
    /// `DependencyCycle` with the offending path, e.g. `a -> b -> a` meaning
    /// `a` depends on `b` which depends on `a`.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let mut color = vec![Color::White; self.len()];
        let mut order = Vec::with_capacity(self.len());
        // (node, index of the next predecessor edge to explore)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.len() {
            if color[root] != Color::White {
                continue;
            }
            color[root] = Color::Gray;
            stack.push((root, 0));

            while let Some((node, next)) = stack.last_mut() {
                let node = *node;
                let Some(edge) = self.preds[node].get(*next) else {
                    color[node] = Color::Black;
                    order.push(node);
                    stack.pop();
                    continue;
                };
                *next += 1;

                match color[edge.from] {
                    Color::White => {
                        color[edge.from] = Color::Gray;
                        stack.push((edge.from, 0));
                    }
                    Color::Gray => return Err(self.cycle_error(&stack, edge.from)),
                    Color::Black => {}
                }
            }
        }
        Ok(order)
    }

    fn cycle_error(&self, stack: &[(usize, usize)], back_to: usize) -> CoreError {
        let start = stack
            .iter()
            .position(|(node, _)| *node == back_to)
            .unwrap_or(0);
        let mut cycle: Vec<String> = stack[start..]
            .iter()
            .map(|(node, _)| self.ids[*node].clone())
            .collect();
        cycle.push(self.ids[back_to].clone());
        CoreError::DependencyCycle { cycle }
    }
}
