//! Dependency scheduling for intermediate fluents.
//!
//! Builds topological levels with Kahn's algorithm: fluents in a level
//! depend only on fluents in earlier levels, so later levels may read
//! already-compiled earlier levels within the same decision step. A cycle
//! is fatal; there is no best-effort ordering.

use groundflow_model::Signature;
use indexmap::IndexMap;

use crate::error::{CompileError, Result};

/// One node to schedule: a fluent and the fluents its expression reads.
#[derive(Debug, Clone)]
pub struct ScheduleNode {
    pub signature: Signature,
    /// Referenced signatures restricted to the scheduled set.
    pub reads: Vec<Signature>,
}

/// Computes topological levels over the nodes.
///
/// Within a level, signatures are sorted for determinism. Reads that do not
/// name a scheduled node are ignored (they resolve to inputs, not to other
/// scheduled fluents).
pub fn topological_levels(nodes: &[ScheduleNode]) -> Result<Vec<Vec<Signature>>> {
    if nodes.is_empty() {
        return Ok(Vec::new());
    }

    let mut in_degree: IndexMap<&Signature, usize> = IndexMap::new();
    let mut dependents: IndexMap<&Signature, Vec<&ScheduleNode>> = IndexMap::new();

    for node in nodes {
        in_degree.insert(&node.signature, 0);
    }

    let scheduled: IndexMap<&Signature, &ScheduleNode> =
        nodes.iter().map(|n| (&n.signature, n)).collect();

    for node in nodes {
        for read in &node.reads {
            if scheduled.contains_key(read) {
                *in_degree.get_mut(&node.signature).unwrap() += 1;
                dependents.entry(read).or_default().push(node);
            }
        }
    }

    let mut levels = Vec::new();
    let mut current: Vec<&ScheduleNode> = nodes
        .iter()
        .filter(|n| in_degree[&n.signature] == 0)
        .collect();

    let mut processed = 0;

    while !current.is_empty() {
        current.sort_by_key(|n| &n.signature);
        processed += current.len();

        let mut next = Vec::new();
        for node in &current {
            if let Some(deps) = dependents.get(&node.signature) {
                for dep in deps {
                    let degree = in_degree.get_mut(&dep.signature).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*dep);
                    }
                }
            }
        }

        levels.push(current.iter().map(|n| n.signature.clone()).collect());
        current = next;
    }

    if processed != nodes.len() {
        let involved: Vec<String> = nodes
            .iter()
            .filter(|n| in_degree[&n.signature] > 0)
            .map(|n| n.signature.to_string())
            .collect();
        return Err(CompileError::CyclicDependency { involved });
    }

    Ok(levels)
}
