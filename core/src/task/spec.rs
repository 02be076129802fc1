use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// One node of the validated, immutable task tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSpec {
    pub name: String,
    /// Instructions shown to a human. Empty for composite tasks.
    pub description: String,
    pub prerequisites: BTreeSet<String>,
    pub subtasks: Vec<TaskSpec>,
    pub only_auto: bool,
}

impl TaskSpec {
    pub fn is_leaf(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Leaves below (or equal to) this task, in document order.
    pub fn leaves(&self) -> Vec<&TaskSpec> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a TaskSpec>) {
        if self.is_leaf() {
            out.push(self);
        } else {
            for t in &self.subtasks {
                t.collect_leaves(out);
            }
        }
    }

    /// Every task in the tree, parents before children.
    pub fn iter(&self) -> impl Iterator<Item = &TaskSpec> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.subtasks.iter().rev());
            Some(next)
        })
    }

    pub fn find(&self, name: &str) -> Option<&TaskSpec> {
        self.iter().find(|t| t.name == name)
    }
}

/// A task exactly as written in the definition file.
#[derive(Debug, Deserialize)]
pub(crate) struct RawTask {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<RawTask>,
    #[serde(default)]
    pub only_auto: bool,
    /// Anything else. Keys starting with `_` are comments.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
