//! Competency graph with prerequisite cycle prevention
//!
//! Objectives are nodes of a petgraph `DiGraph`. Edge direction: `P -> D`
//! means "P is a prerequisite of D", so a topological order of the graph is
//! a valid study order.
//!
//! The graph is kept acyclic on every insert with a reachability check from
//! the inserted objective, instead of re-sorting the whole graph.

mod objective;
mod order;

pub use objective::{LearningObjective, ObjectiveBounds};

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef, Reversed};
use petgraph::Direction;
use tracing::{debug, warn};

use crate::error::{PathwayError, Result};
use crate::types::ObjectiveId;

/// Directed acyclic graph of learning objectives.
pub struct CompetencyGraph {
    graph: DiGraph<ObjectiveId, ()>,
    node_indices: HashMap<ObjectiveId, NodeIndex>,
    objectives: BTreeMap<ObjectiveId, LearningObjective>,
    bounds: ObjectiveBounds,
}

impl CompetencyGraph {
    pub fn new(bounds: ObjectiveBounds) -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            objectives: BTreeMap::new(),
            bounds,
        }
    }

    /// Bulk-loads curriculum data given in any order.
    ///
    /// Objectives are inserted once all of their prerequisites are present.
    /// Whatever cannot be inserted is reported as a dangling reference
    /// (`UnknownObjective`) or a `Cycle`.
    pub fn from_objectives(
        objectives: impl IntoIterator<Item = LearningObjective>,
        bounds: ObjectiveBounds,
    ) -> Result<Self> {
        let mut graph = Self::new(bounds);
        let mut pending: BTreeMap<ObjectiveId, LearningObjective> = BTreeMap::new();
        for objective in objectives {
            pending.insert(objective.id.clone(), objective);
        }

        loop {
            let ready: Vec<ObjectiveId> = pending
                .values()
                .filter(|o| o.prerequisite_ids.iter().all(|p| graph.contains(p)))
                .map(|o| o.id.clone())
                .collect();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                if let Some(objective) = pending.remove(&id) {
                    graph.add_objective(objective)?;
                }
            }
        }

        if pending.is_empty() {
            return Ok(graph);
        }

        for objective in pending.values() {
            if let Some(missing) = objective
                .prerequisite_ids
                .iter()
                .find(|p| !graph.contains(p) && !pending.contains_key(*p))
            {
                return Err(PathwayError::UnknownObjective(missing.clone()));
            }
        }

        let via = Self::cycle_members(&pending);
        let objective = via
            .first()
            .cloned()
            .or_else(|| pending.keys().next().cloned())
            .unwrap_or_else(|| ObjectiveId::new(""));
        warn!(%objective, ?via, "curriculum contains a prerequisite cycle");
        Err(PathwayError::Cycle { objective, via })
    }

    /// Adds an objective, or replaces the prerequisites of an existing one.
    ///
    /// Fails with `Cycle` when the new prerequisite edges would close a
    /// cycle; a rejected insert leaves the graph unchanged.
    pub fn add_objective(&mut self, objective: LearningObjective) -> Result<()> {
        self.bounds.check(&objective)?;

        for prerequisite in &objective.prerequisite_ids {
            if !self.contains(prerequisite) {
                return Err(PathwayError::UnknownObjective(prerequisite.clone()));
            }
        }

        // A new node has no outgoing edges yet, so only a replacement can
        // close a cycle: that happens when the objective already reaches
        // one of its new prerequisites.
        if let Some(&idx) = self.node_indices.get(&objective.id) {
            for prerequisite in &objective.prerequisite_ids {
                let pre_idx = self.node_indices[prerequisite];
                if has_path_connecting(&self.graph, idx, pre_idx, None) {
                    let mut via = self.find_path(idx, pre_idx);
                    via.push(objective.id.clone());
                    warn!(objective = %objective.id, ?via, "rejected prerequisite cycle");
                    return Err(PathwayError::Cycle {
                        objective: objective.id.clone(),
                        via,
                    });
                }
            }
        }

        let idx = self.get_or_create_node(&objective.id);
        loop {
            let incoming = self
                .graph
                .edges_directed(idx, Direction::Incoming)
                .next()
                .map(|e| e.id());
            match incoming {
                Some(edge) => {
                    self.graph.remove_edge(edge);
                }
                None => break,
            }
        }
        for prerequisite in &objective.prerequisite_ids {
            let pre_idx = self.node_indices[prerequisite];
            self.graph.add_edge(pre_idx, idx, ());
        }

        debug!(
            objective = %objective.id,
            prerequisites = objective.prerequisite_ids.len(),
            "objective added"
        );
        self.objectives.insert(objective.id.clone(), objective);
        Ok(())
    }

    /// Direct prerequisites of an objective, ordered by id.
    pub fn prerequisites_of(&self, id: &ObjectiveId) -> Result<Vec<ObjectiveId>> {
        let objective = self.get(id)?;
        Ok(objective.prerequisite_ids.iter().cloned().collect())
    }

    /// Objectives that list this one as a direct prerequisite, ordered by id.
    pub fn dependents_of(&self, id: &ObjectiveId) -> Result<Vec<ObjectiveId>> {
        let idx = self.index_of(id)?;
        let mut result: Vec<ObjectiveId> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect();
        result.sort();
        result.dedup();
        Ok(result)
    }

    /// Transitive prerequisites of an objective, ordered by id.
    pub fn ancestors_of(&self, id: &ObjectiveId) -> Result<Vec<ObjectiveId>> {
        let idx = self.index_of(id)?;
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, idx);
        let mut result = BTreeSet::new();
        while let Some(reached) = dfs.next(reversed) {
            if reached != idx {
                result.insert(self.graph[reached].clone());
            }
        }
        Ok(result.into_iter().collect())
    }

    /// Transitive dependents of an objective, ordered by id.
    pub fn descendants_of(&self, id: &ObjectiveId) -> Result<Vec<ObjectiveId>> {
        let idx = self.index_of(id)?;
        let mut dfs = Dfs::new(&self.graph, idx);
        let mut result = BTreeSet::new();
        while let Some(reached) = dfs.next(&self.graph) {
            if reached != idx {
                result.insert(self.graph[reached].clone());
            }
        }
        Ok(result.into_iter().collect())
    }

    /// Returns true if `prerequisite` is a direct or transitive prerequisite of `objective`.
    pub fn is_prerequisite_of(&self, prerequisite: &ObjectiveId, objective: &ObjectiveId) -> Result<bool> {
        let from = self.index_of(prerequisite)?;
        let to = self.index_of(objective)?;
        Ok(from != to && has_path_connecting(&self.graph, from, to, None))
    }

    /// Strongly connected components with more than one member.
    ///
    /// Always empty for a graph built through `add_objective`; kept as an
    /// integrity audit for curriculum maintainers.
    pub fn detect_cycles(&self) -> Vec<Vec<ObjectiveId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut ids: Vec<ObjectiveId> =
                    scc.into_iter().map(|idx| self.graph[idx].clone()).collect();
                ids.sort();
                ids
            })
            .collect()
    }

    pub fn get(&self, id: &ObjectiveId) -> Result<&LearningObjective> {
        self.objectives
            .get(id)
            .ok_or_else(|| PathwayError::UnknownObjective(id.clone()))
    }

    pub fn contains(&self, id: &ObjectiveId) -> bool {
        self.objectives.contains_key(id)
    }

    /// All objectives, ordered by id.
    pub fn objectives(&self) -> impl Iterator<Item = &LearningObjective> {
        self.objectives.values()
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    pub fn bounds(&self) -> ObjectiveBounds {
        self.bounds
    }

    pub(crate) fn index_of(&self, id: &ObjectiveId) -> Result<NodeIndex> {
        self.node_indices
            .get(id)
            .copied()
            .ok_or_else(|| PathwayError::UnknownObjective(id.clone()))
    }

    fn get_or_create_node(&mut self, id: &ObjectiveId) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_indices.insert(id.clone(), idx);
        idx
    }

    /// Shortest edge path `from -> ... -> to`, for error reporting.
    fn find_path(&self, from: NodeIndex, to: NodeIndex) -> Vec<ObjectiveId> {
        let mut parents: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                break;
            }
            let mut next: Vec<NodeIndex> =
                self.graph.neighbors_directed(current, Direction::Outgoing).collect();
            next.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
            for neighbor in next {
                if neighbor != from && !parents.contains_key(&neighbor) {
                    parents.insert(neighbor, current);
                    queue.push_back(neighbor);
                }
            }
        }

        let mut path = vec![self.graph[to].clone()];
        let mut current = to;
        while let Some(&parent) = parents.get(&current) {
            path.push(self.graph[parent].clone());
            current = parent;
        }
        path.reverse();
        path
    }

    /// Members of the first prerequisite cycle among objectives that could not be inserted.
    fn cycle_members(pending: &BTreeMap<ObjectiveId, LearningObjective>) -> Vec<ObjectiveId> {
        let mut temp: DiGraph<ObjectiveId, ()> = DiGraph::new();
        let mut indices = HashMap::new();
        for id in pending.keys() {
            indices.insert(id.clone(), temp.add_node(id.clone()));
        }
        for objective in pending.values() {
            for prerequisite in &objective.prerequisite_ids {
                if let Some(&from) = indices.get(prerequisite) {
                    temp.add_edge(from, indices[&objective.id], ());
                }
            }
        }

        let mut cycles: Vec<Vec<ObjectiveId>> = tarjan_scc(&temp)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut ids: Vec<ObjectiveId> = scc.into_iter().map(|i| temp[i].clone()).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles.into_iter().next().unwrap_or_default()
    }
}

impl Default for CompetencyGraph {
    fn default() -> Self {
        Self::new(ObjectiveBounds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(id: &str) -> LearningObjective {
        LearningObjective::new(id, "mathematics", format!("Objective {id}"), 2, 30)
    }

    fn chain() -> CompetencyGraph {
        // b -> c -> d
        let mut graph = CompetencyGraph::default();
        graph.add_objective(obj("b")).unwrap();
        graph.add_objective(obj("c").requires("b")).unwrap();
        graph.add_objective(obj("d").requires("c")).unwrap();
        graph
    }

    #[test]
    fn test_add_objective() {
        let graph = chain();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.prerequisites_of(&"c".into()).unwrap(), vec![ObjectiveId::new("b")]);
    }

    #[test]
    fn test_unknown_prerequisite_rejected() {
        let mut graph = CompetencyGraph::default();
        let result = graph.add_objective(obj("a").requires("missing"));
        assert!(matches!(result, Err(PathwayError::UnknownObjective(id)) if id.as_str() == "missing"));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_dependents_sorted() {
        let mut graph = CompetencyGraph::default();
        graph.add_objective(obj("root")).unwrap();
        graph.add_objective(obj("z").requires("root")).unwrap();
        graph.add_objective(obj("m").requires("root")).unwrap();
        graph.add_objective(obj("a").requires("root")).unwrap();

        let dependents = graph.dependents_of(&"root".into()).unwrap();
        assert_eq!(dependents, vec![ObjectiveId::new("a"), ObjectiveId::new("m"), ObjectiveId::new("z")]);
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let graph = chain();
        assert_eq!(
            graph.ancestors_of(&"d".into()).unwrap(),
            vec![ObjectiveId::new("b"), ObjectiveId::new("c")]
        );
        assert_eq!(
            graph.descendants_of(&"b".into()).unwrap(),
            vec![ObjectiveId::new("c"), ObjectiveId::new("d")]
        );
        assert!(graph.is_prerequisite_of(&"b".into(), &"d".into()).unwrap());
        assert!(!graph.is_prerequisite_of(&"d".into(), &"b".into()).unwrap());
    }

    #[test]
    fn test_replacement_creating_cycle_rejected() {
        let mut graph = chain();

        // b requiring d would close b -> c -> d -> b
        let result = graph.add_objective(obj("b").requires("d"));
        match result {
            Err(PathwayError::Cycle { objective, via }) => {
                assert_eq!(objective.as_str(), "b");
                assert_eq!(
                    via,
                    vec![ObjectiveId::new("b"), ObjectiveId::new("c"), ObjectiveId::new("d"), ObjectiveId::new("b")]
                );
            }
            other => panic!("expected cycle, got {other:?}"),
        }

        // Graph unchanged
        assert!(graph.prerequisites_of(&"b".into()).unwrap().is_empty());
        assert!(graph.detect_cycles().is_empty());
    }

    #[test]
    fn test_replacement_updates_prerequisites() {
        let mut graph = chain();
        graph.add_objective(obj("a")).unwrap();
        graph.add_objective(obj("d").requires("a")).unwrap();

        assert_eq!(graph.prerequisites_of(&"d".into()).unwrap(), vec![ObjectiveId::new("a")]);
        assert!(graph.dependents_of(&"c".into()).unwrap().is_empty());
        assert_eq!(graph.dependents_of(&"a".into()).unwrap(), vec![ObjectiveId::new("d")]);
    }

    #[test]
    fn test_from_objectives_any_order() {
        let graph = CompetencyGraph::from_objectives(
            vec![obj("d").requires("c"), obj("c").requires("b"), obj("b")],
            ObjectiveBounds::default(),
        )
        .unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.ancestors_of(&"d".into()).unwrap().len(), 2);
    }

    #[test]
    fn test_from_objectives_dangling_reference() {
        let result = CompetencyGraph::from_objectives(
            vec![obj("a").requires("ghost"), obj("b")],
            ObjectiveBounds::default(),
        );
        assert!(matches!(result, Err(PathwayError::UnknownObjective(id)) if id.as_str() == "ghost"));
    }

    #[test]
    fn test_from_objectives_cycle() {
        let result = CompetencyGraph::from_objectives(
            vec![
                obj("x").requires("z"),
                obj("y").requires("x"),
                obj("z").requires("y"),
                obj("w").requires("x"),
            ],
            ObjectiveBounds::default(),
        );
        match result {
            Err(PathwayError::Cycle { via, .. }) => {
                assert_eq!(via, vec![ObjectiveId::new("x"), ObjectiveId::new("y"), ObjectiveId::new("z")]);
            }
            other => panic!("expected cycle, got {:?}", other.map(|g| g.len())),
        }
    }

    #[test]
    fn test_get_unknown() {
        let graph = CompetencyGraph::default();
        assert!(matches!(graph.get(&"nope".into()), Err(PathwayError::UnknownObjective(_))));
        assert!(graph.dependents_of(&"nope".into()).is_err());
    }
}
