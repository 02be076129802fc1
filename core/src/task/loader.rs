use std::path::Path;

use crate::error::DefinitionError;
use crate::executor::graph::TaskGraph;

use super::markup;
use super::spec::{RawTask, TaskSpec};

/// A task tree that passed every load-time check, with its runtime graph.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub root: TaskSpec,
    pub graph: TaskGraph,
}

/// Read and validate a JSON task file.
pub fn load(path: &Path) -> Result<TaskDefinition, DefinitionError> {
    let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "loading task definition");
    from_str(&text)
}

/// Parse and validate a JSON task tree.
///
/// Rejects malformed fields, duplicate names, unknown prerequisites,
/// prerequisite cycles and malformed description directives.
pub fn from_str(text: &str) -> Result<TaskDefinition, DefinitionError> {
    let raw: RawTask = serde_json::from_str(text)?;
    let root = convert(raw)?;
    let graph = TaskGraph::build(&root)?;
    tracing::info!(
        tasks = root.iter().count(),
        leaves = graph.len(),
        "task definition loaded"
    );
    Ok(TaskDefinition { root, graph })
}

fn convert(raw: RawTask) -> Result<TaskSpec, DefinitionError> {
    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err(DefinitionError::BlankName);
    }
    if name.eq_ignore_ascii_case("none") {
        return Err(DefinitionError::ReservedName);
    }

    let unknown: Vec<&str> = raw
        .extra
        .keys()
        .map(String::as_str)
        .filter(|k| !k.starts_with('_'))
        .collect();
    if !unknown.is_empty() {
        return Err(DefinitionError::UnknownFields {
            task: name,
            fields: unknown.join(", "),
        });
    }

    let has_description = !raw.description.trim().is_empty();
    if raw.subtasks.is_empty() && !has_description {
        return Err(DefinitionError::MissingDescription(name));
    }
    if !raw.subtasks.is_empty() && has_description {
        return Err(DefinitionError::CompositeDescription(name));
    }
    if !raw.subtasks.is_empty() && raw.only_auto {
        return Err(DefinitionError::CompositeOnlyAuto(name));
    }

    if let Err(e) = markup::validate(&raw.description) {
        return Err(DefinitionError::Markup {
            task: name,
            reason: e.reason,
            offset: e.offset,
        });
    }

    let prerequisites = raw
        .prerequisites
        .iter()
        .map(|p| p.trim().to_string())
        .collect();
    let subtasks = raw
        .subtasks
        .into_iter()
        .map(convert)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TaskSpec {
        name,
        description: raw.description,
        prerequisites,
        subtasks,
        only_auto: raw.only_auto,
    })
}
