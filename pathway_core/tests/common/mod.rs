//! Common test utilities for pathway integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use pathway_core::{
    CompetencyGraph, ContentChunk, EngineConfig, InMemoryContentStore, LearningObjective,
    LearningPath, Mastery, ObjectiveBounds, ObjectiveId, PathPlanner, StudentProfile,
};

/// Curriculum used by the chain scenarios: `A` standalone, `B -> C -> D`.
pub const CHAIN_CURRICULUM: &str = r#"
- id: A
  subject: math
  description: Counting objects
  target_difficulty: 1
  estimated_duration_minutes: 20
- id: B
  subject: math
  description: Adding whole numbers
  target_difficulty: 2
  estimated_duration_minutes: 30
  modality_tags: [visual]
- id: C
  subject: math
  description: Multiplying whole numbers
  target_difficulty: 3
  estimated_duration_minutes: 30
  prerequisite_ids: [B]
- id: D
  subject: math
  description: Dividing whole numbers
  target_difficulty: 4
  estimated_duration_minutes: 45
  prerequisite_ids: [C]
"#;

pub fn id(s: &str) -> ObjectiveId {
    ObjectiveId::new(s)
}

/// Parses a YAML list of objectives into a graph.
pub fn graph_from_yaml(yaml: &str) -> pathway_core::Result<CompetencyGraph> {
    let objectives: Vec<LearningObjective> = serde_yaml::from_str(yaml)?;
    CompetencyGraph::from_objectives(objectives, ObjectiveBounds::default())
}

/// Writes a curriculum file and loads it back.
pub fn graph_from_file(dir: &Path, yaml: &str) -> pathway_core::Result<CompetencyGraph> {
    let file = dir.join("curriculum.yaml");
    std::fs::write(&file, yaml)?;
    graph_from_yaml(&std::fs::read_to_string(&file)?)
}

pub fn chain_graph() -> Arc<CompetencyGraph> {
    Arc::new(graph_from_yaml(CHAIN_CURRICULUM).expect("chain curriculum is valid"))
}

/// Store with two chunks per listed objective; `<id>-1` always ranks first.
pub fn stocked_store(objectives: &[&str]) -> InMemoryContentStore {
    let mut store = InMemoryContentStore::new();
    for objective in objectives {
        store.insert(
            ContentChunk::new(format!("{objective}-0"), "math", 2).supporting(*objective),
            Some(0.4),
        );
        store.insert(
            ContentChunk::new(format!("{objective}-1"), "math", 2).supporting(*objective),
            Some(0.9),
        );
    }
    store
}

pub fn planner(store: InMemoryContentStore) -> PathPlanner {
    PathPlanner::new(chain_graph(), Arc::new(store), &EngineConfig::default())
}

/// Mastery {A: 0.9, B: 0.2}, two objectives per session.
pub fn scenario_profile() -> StudentProfile {
    StudentProfile::new("student-1", 2)
        .with_mastery("A", Mastery::new(0.9).expect("valid mastery"))
        .with_mastery("B", Mastery::new(0.2).expect("valid mastery"))
}

pub fn order(path: &LearningPath) -> Vec<&str> {
    path.steps.iter().map(|s| s.objective_id.as_str()).collect()
}
