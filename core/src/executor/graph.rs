use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::DefinitionError;
use crate::task::TaskSpec;

/// A leaf task as the scheduler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub name: String,
    /// 1-based position in execution order.
    pub index: usize,
    pub description: String,
    pub only_auto: bool,
    /// Direct prerequisites after expansion and reduction, in index order.
    pub prerequisites: Vec<String>,
}

/// A composite task, kept only for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeNode {
    pub name: String,
    /// Leaves below this composite, in index order.
    pub leaves: Vec<String>,
}

/// Runtime task graph (DAG over leaf tasks)
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Leaves in execution order
    nodes: Vec<LeafNode>,

    /// Leaf name -> position in `nodes`
    positions: HashMap<String, usize>,

    composites: Vec<CompositeNode>,

    /// Leaf name -> enclosing composites, innermost first
    ancestors: HashMap<String, Vec<String>>,
}

impl TaskGraph {
    /// Build the runtime graph from a task tree.
    ///
    /// # Algorithm
    ///
    /// 1. Check every prerequisite names an existing task
    /// 2. Push composite prerequisites down to their leaves and expand
    ///    prerequisites naming a composite to that composite's leaves
    /// 3. Sort leaves so each comes after its prerequisites, staying as close
    ///    to document order as possible (reports a cycle otherwise)
    /// 4. Drop prerequisites already implied by another prerequisite
    pub fn build(root: &TaskSpec) -> Result<Self, DefinitionError> {
        let mut by_name: HashMap<&str, &TaskSpec> = HashMap::new();
        for task in root.iter() {
            if by_name.insert(task.name.as_str(), task).is_some() {
                return Err(DefinitionError::DuplicateName(task.name.clone()));
            }
        }

        for task in root.iter() {
            if let Some(missing) = task
                .prerequisites
                .iter()
                .find(|p| !by_name.contains_key(p.as_str()))
            {
                return Err(DefinitionError::PrerequisiteNotFound {
                    task: task.name.clone(),
                    missing: missing.clone(),
                });
            }
        }

        let mut leaves = Vec::new();
        normalize(root, &BTreeSet::new(), &by_name, &mut leaves);
        let sorted = sort_leaves(leaves)?;
        let reduced = remove_redundant_prerequisites(sorted);

        let mut nodes = Vec::with_capacity(reduced.len());
        let mut positions = HashMap::new();
        for (i, leaf) in reduced.into_iter().enumerate() {
            positions.insert(leaf.name.clone(), i);
            nodes.push(LeafNode {
                index: i + 1,
                ..leaf
            });
        }
        // Prerequisites were collected as sets; present them in run order.
        for node in &mut nodes {
            node.prerequisites
                .sort_by_key(|p| positions.get(p).copied().unwrap_or(usize::MAX));
        }

        let mut composites = Vec::new();
        let mut ancestors: HashMap<String, Vec<String>> = HashMap::new();
        collect_composites(root, &mut Vec::new(), &positions, &mut composites, &mut ancestors);

        Ok(Self {
            nodes,
            positions,
            composites,
            ancestors,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaves in execution order.
    pub fn leaves(&self) -> &[LeafNode] {
        &self.nodes
    }

    pub fn leaf(&self, name: &str) -> Option<&LeafNode> {
        self.positions.get(name).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn composites(&self) -> &[CompositeNode] {
        &self.composites
    }

    pub fn composite(&self, name: &str) -> Option<&CompositeNode> {
        self.composites.iter().find(|c| c.name == name)
    }

    /// Composites enclosing `leaf`, innermost first.
    pub fn ancestors_of(&self, leaf: &str) -> &[String] {
        self.ancestors
            .get(leaf)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn normalize(
    task: &TaskSpec,
    upper: &BTreeSet<String>,
    by_name: &HashMap<&str, &TaskSpec>,
    out: &mut Vec<LeafNode>,
) {
    let combined: BTreeSet<String> = task.prerequisites.union(upper).cloned().collect();
    if task.is_leaf() {
        let expanded = combined
            .iter()
            .filter_map(|p| by_name.get(p.as_str()))
            .flat_map(|p| p.leaves())
            .map(|leaf| leaf.name.clone())
            .collect::<BTreeSet<_>>();
        out.push(LeafNode {
            name: task.name.clone(),
            index: 0,
            description: task.description.clone(),
            only_auto: task.only_auto,
            prerequisites: expanded.into_iter().collect(),
        });
    } else {
        for sub in &task.subtasks {
            normalize(sub, &combined, by_name, out);
        }
    }
}

/// Repeatedly take the first remaining leaf whose prerequisites are all placed.
fn sort_leaves(mut remaining: Vec<LeafNode>) -> Result<Vec<LeafNode>, DefinitionError> {
    let mut sorted = Vec::with_capacity(remaining.len());
    let mut placed: HashSet<String> = HashSet::new();

    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .position(|t| t.prerequisites.iter().all(|p| placed.contains(p)));
        match ready {
            Some(i) => {
                let task = remaining.remove(i);
                placed.insert(task.name.clone());
                sorted.push(task);
            }
            None => {
                return Err(DefinitionError::Cycle(format_cycle_path(&find_cycle(
                    &remaining,
                ))))
            }
        }
    }

    Ok(sorted)
}

/// Every remaining task has at least one remaining prerequisite, so following
/// the first one from any task must eventually revisit a task.
fn find_cycle(remaining: &[LeafNode]) -> Vec<String> {
    let names: HashSet<&str> = remaining.iter().map(|t| t.name.as_str()).collect();
    let next: HashMap<&str, &str> = remaining
        .iter()
        .filter_map(|t| {
            t.prerequisites
                .iter()
                .find(|p| names.contains(p.as_str()))
                .map(|p| (t.name.as_str(), p.as_str()))
        })
        .collect();

    let mut path: Vec<&str> = Vec::new();
    let mut current = remaining[0].name.as_str();
    loop {
        if let Some(pos) = path.iter().position(|n| *n == current) {
            path.drain(..pos);
            break;
        }
        path.push(current);
        match next.get(current) {
            Some(n) => current = *n,
            None => break,
        }
    }

    // Start at the smallest name so the report is deterministic.
    if let Some(min_pos) = path
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| **n)
        .map(|(i, _)| i)
    {
        path.rotate_left(min_pos);
    }
    let mut cycle: Vec<String> = path.iter().map(|s| s.to_string()).collect();
    if let Some(first) = cycle.first().cloned() {
        cycle.push(first);
    }
    cycle
}

fn format_cycle_path(cycle: &[String]) -> String {
    cycle.join(" --> ")
}

/// Transitive reduction over an already sorted list.
fn remove_redundant_prerequisites(sorted: Vec<LeafNode>) -> Vec<LeafNode> {
    let mut all: HashMap<String, BTreeSet<String>> = HashMap::new();
    for task in &sorted {
        let mut closure: BTreeSet<String> = task.prerequisites.iter().cloned().collect();
        for p in &task.prerequisites {
            if let Some(upstream) = all.get(p) {
                closure.extend(upstream.iter().cloned());
            }
        }
        all.insert(task.name.clone(), closure);
    }

    sorted
        .into_iter()
        .map(|mut task| {
            let implied: HashSet<&String> = task
                .prerequisites
                .iter()
                .filter_map(|p| all.get(p))
                .flatten()
                .collect();
            let kept: Vec<String> = task
                .prerequisites
                .iter()
                .filter(|p| !implied.contains(p))
                .cloned()
                .collect();
            task.prerequisites = kept;
            task
        })
        .collect()
}

fn collect_composites(
    task: &TaskSpec,
    path: &mut Vec<String>,
    positions: &HashMap<String, usize>,
    composites: &mut Vec<CompositeNode>,
    ancestors: &mut HashMap<String, Vec<String>>,
) {
    if task.is_leaf() {
        ancestors.insert(task.name.clone(), path.iter().rev().cloned().collect());
        return;
    }

    let mut leaves: Vec<String> = task.leaves().iter().map(|l| l.name.clone()).collect();
    leaves.sort_by_key(|l| positions.get(l).copied().unwrap_or(usize::MAX));
    composites.push(CompositeNode {
        name: task.name.clone(),
        leaves,
    });

    path.push(task.name.clone());
    for sub in &task.subtasks {
        collect_composites(sub, path, positions, composites, ancestors);
    }
    path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task;
    use pretty_assertions::assert_eq;

    fn graph(json: &str) -> Result<TaskGraph, DefinitionError> {
        task::from_str(json).map(|d| d.graph)
    }

    fn order(g: &TaskGraph) -> Vec<(&str, usize)> {
        g.leaves().iter().map(|l| (l.name.as_str(), l.index)).collect()
    }

    #[test]
    fn test_diamond_order_and_indices() {
        let g = graph(
            r#"{"name": "root", "subtasks": [
                {"name": "D", "description": "d", "prerequisites": ["B", "C"]},
                {"name": "B", "description": "b", "prerequisites": ["A"]},
                {"name": "C", "description": "c", "prerequisites": ["A"]},
                {"name": "A", "description": "a"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(order(&g), vec![("A", 1), ("B", 2), ("C", 3), ("D", 4)]);
        assert_eq!(g.leaf("D").unwrap().prerequisites, vec!["B", "C"]);
    }

    #[test]
    fn test_redundant_prerequisites_removed() {
        let g = graph(
            r#"{"name": "root", "subtasks": [
                {"name": "a", "description": "a"},
                {"name": "b", "description": "b", "prerequisites": ["a"]},
                {"name": "c", "description": "c", "prerequisites": ["a", "b"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(g.leaf("c").unwrap().prerequisites, vec!["b"]);
        assert_eq!(g.leaf("b").unwrap().prerequisites, vec!["a"]);
    }

    #[test]
    fn test_composite_prerequisites_pushed_down_and_expanded() {
        let g = graph(
            r#"{"name": "root", "subtasks": [
                {"name": "setup", "subtasks": [
                    {"name": "s1", "description": "x"},
                    {"name": "s2", "description": "x"}
                ]},
                {"name": "show", "prerequisites": ["setup"], "subtasks": [
                    {"name": "t1", "description": "x"},
                    {"name": "t2", "description": "x", "prerequisites": ["t1"]}
                ]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(g.leaf("t1").unwrap().prerequisites, vec!["s1", "s2"]);
        // s1 and s2 are implied through t1.
        assert_eq!(g.leaf("t2").unwrap().prerequisites, vec!["t1"]);
        assert_eq!(g.ancestors_of("t2"), &["show".to_string(), "root".to_string()]);
        assert_eq!(g.composite("setup").unwrap().leaves, vec!["s1", "s2"]);
    }

    #[test]
    fn test_cross_scope_prerequisite_is_allowed() {
        let g = graph(
            r#"{"name": "root", "subtasks": [
                {"name": "g1", "subtasks": [{"name": "a", "description": "x", "prerequisites": ["b"]}]},
                {"name": "g2", "subtasks": [{"name": "b", "description": "x"}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(order(&g), vec![("b", 1), ("a", 2)]);
    }

    #[test]
    fn test_depending_on_own_ancestor_is_a_cycle() {
        let err = graph(
            r#"{"name": "root", "subtasks": [
                {"name": "g", "subtasks": [{"name": "a", "description": "x", "prerequisites": ["g"]}]}
            ]}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "the task graph contains a cycle: a --> a");
    }

    #[test]
    fn test_cycle_starts_at_smallest_name() {
        let err = graph(
            r#"{"name": "root", "subtasks": [
                {"name": "ok", "description": "x"},
                {"name": "z", "description": "x", "prerequisites": ["ok", "y"]},
                {"name": "y", "description": "x", "prerequisites": ["x"]},
                {"name": "x", "description": "x", "prerequisites": ["z"]}
            ]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "the task graph contains a cycle: x --> z --> y --> x"
        );
    }
}
