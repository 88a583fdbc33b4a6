//! Deterministic topological ordering of objective subsets.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use petgraph::visit::{Dfs, Reversed};

use super::CompetencyGraph;
use crate::error::{PathwayError, Result};
use crate::types::ObjectiveId;

impl CompetencyGraph {
    /// Linearizes a subset of objectives with Kahn's algorithm.
    ///
    /// Among ready objectives the lowest id is emitted first, so identical
    /// inputs always produce the identical order. Prerequisite relations are
    /// taken transitively: if `a` reaches `c` only through an objective
    /// outside the subset, `a` still precedes `c`.
    ///
    /// Duplicate ids are collapsed. Unknown ids fail with `UnknownObjective`.
    pub fn topological_order<'a, I>(&self, subset: I) -> Result<Vec<ObjectiveId>>
    where
        I: IntoIterator<Item = &'a ObjectiveId>,
    {
        let mut members = BTreeSet::new();
        for id in subset {
            self.index_of(id)?;
            members.insert(id.clone());
        }

        let mut in_degree: BTreeMap<&ObjectiveId, usize> =
            members.iter().map(|id| (id, 0)).collect();
        let mut successors: BTreeMap<&ObjectiveId, Vec<&ObjectiveId>> = BTreeMap::new();

        for id in &members {
            let idx = self.index_of(id)?;
            let reversed = Reversed(&self.graph);
            let mut dfs = Dfs::new(reversed, idx);
            while let Some(reached) = dfs.next(reversed) {
                if reached == idx {
                    continue;
                }
                if let Some(ancestor) = members.get(&self.graph[reached]) {
                    successors.entry(ancestor).or_default().push(id);
                    if let Some(degree) = in_degree.get_mut(id) {
                        *degree += 1;
                    }
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<&ObjectiveId>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id.clone());
            if let Some(next) = successors.get(id) {
                for &dependent in next {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(Reverse(dependent));
                        }
                    }
                }
            }
        }

        if order.len() != members.len() {
            // Unreachable while add_objective keeps the graph acyclic.
            let via: Vec<ObjectiveId> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id.clone())
                .collect();
            let objective = via.first().cloned().unwrap_or_else(|| ObjectiveId::new(""));
            return Err(PathwayError::Cycle { objective, via });
        }

        Ok(order)
    }
}
