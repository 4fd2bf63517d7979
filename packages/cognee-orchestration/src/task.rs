//! Task & Pipeline DAG model (spec 4.6, C6).
//!
//! A `Task` is a named async function; a `Pipeline` is a DAG of tasks whose
//! edges are declared by each task listing the names of its input tasks.
//! `run_tasks_base` is the single-threaded cooperative executor: it computes
//! the reverse-dependency map, seeds a ready queue, and runs tasks as their
//! dependencies complete (spec 4.6 "Execution").

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

/// The value threaded between tasks. Most pipeline stages pass `Nodes`
/// (DataPoints flowing toward `add_data_points`); `Raw` covers the initial
/// input (file text, chunk config) and terminal scalar outputs (search
/// results, run summaries).
#[derive(Debug, Clone)]
pub enum TaskValue {
    Empty,
    Nodes(Vec<cognee_ir::Node>),
    /// Nodes plus explicit relationship edges that don't fit a DataPoint
    /// field (spec 3 "Edge": explicit edges returned alongside extraction
    /// output rather than nested).
    NodesWithEdges(Vec<cognee_ir::Node>, Vec<cognee_ir::Edge>),
    Raw(Value),
}

impl TaskValue {
    pub fn into_nodes(self) -> Vec<cognee_ir::Node> {
        match self {
            TaskValue::Nodes(nodes) => nodes,
            TaskValue::NodesWithEdges(nodes, _) => nodes,
            _ => Vec::new(),
        }
    }

    pub fn into_nodes_and_edges(self) -> (Vec<cognee_ir::Node>, Vec<cognee_ir::Edge>) {
        match self {
            TaskValue::Nodes(nodes) => (nodes, Vec::new()),
            TaskValue::NodesWithEdges(nodes, edges) => (nodes, edges),
            _ => (Vec::new(), Vec::new()),
        }
    }

    /// Concatenates two upstream lists (spec 4.6 "merging inputs").
    pub fn merge(a: TaskValue, b: TaskValue) -> TaskValue {
        match (a, b) {
            (TaskValue::Empty, other) | (other, TaskValue::Empty) => other,
            (TaskValue::Nodes(mut x), TaskValue::Nodes(y)) => {
                x.extend(y);
                TaskValue::Nodes(x)
            }
            (TaskValue::Raw(Value::Array(mut x)), TaskValue::Raw(Value::Array(y))) => {
                x.extend(y);
                TaskValue::Raw(Value::Array(x))
            }
            (a, b) => {
                let (mut nodes_a, mut edges_a) = a.into_nodes_and_edges();
                let (nodes_b, edges_b) = b.into_nodes_and_edges();
                nodes_a.extend(nodes_b);
                edges_a.extend(edges_b);
                TaskValue::NodesWithEdges(nodes_a, edges_a)
            }
        }
    }
}

/// Context shared across a single pipeline run: identity for provenance
/// stamping and a handle to the routed stores.
#[derive(Clone)]
pub struct TaskContext {
    pub pipeline_name: String,
    pub pipeline_id: Uuid,
    pub run_id: Uuid,
    pub task_name: String,
}

#[async_trait]
pub trait Task: Send + Sync {
    /// Declared input dependencies, referenced by task name (spec 4.6 "Task").
    fn inputs(&self) -> &[String];

    /// When true, `inputs()` must have exactly two entries whose upstream
    /// results are concatenated rather than passed positionally (spec 4.6
    /// "Merging inputs": a first-class input modifier, not a task).
    fn merges_inputs(&self) -> bool {
        false
    }

    async fn run(&self, inputs: Vec<TaskValue>, ctx: &TaskContext) -> Result<TaskValue>;
}

struct TaskSpec {
    name: String,
    task: Arc<dyn Task>,
}

/// A named DAG of tasks (spec 4.6 "Pipeline"). `pipeline_id` is derived
/// deterministically from `name` so repeated runs of the same pipeline
/// definition share one identity across processes.
pub struct Pipeline {
    pub name: String,
    pub pipeline_id: Uuid,
    tasks: Vec<TaskSpec>,
}

pub struct PipelineBuilder {
    name: String,
    tasks: Vec<TaskSpec>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    pub fn add_task(mut self, name: impl Into<String>, task: Arc<dyn Task>) -> Self {
        self.tasks.push(TaskSpec {
            name: name.into(),
            task,
        });
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            pipeline_id: cognee_ir::stable_id(&self.name),
            name: self.name,
            tasks: self.tasks,
        }
    }
}

/// One frame of pipeline progress (spec 4.6 step 3 "yield intermediate
/// TaskExecutionInfo frames").
#[derive(Debug, Clone)]
pub struct TaskExecutionInfo {
    pub task_name: String,
    pub is_done: bool,
}

/// Execute `pipeline` to completion against `seed_input`, returning the
/// per-task progress frames in completion order and the final task's output.
///
/// Implements spec 4.6's algorithm: reverse-dependency map, ready queue
/// seeded with zero-input tasks, pop-run-enqueue-dependents until the queue
/// drains. A dangling task (cycle or an input name that never runs) leaves
/// `executed < tasks.len()`, which is `WrongTaskOrder` (mirrors Python's
/// `WrongTaskOrderException`).
pub async fn run_tasks_base(
    pipeline: &Pipeline,
    seed_input: TaskValue,
    run_id: Uuid,
) -> Result<(Vec<TaskExecutionInfo>, TaskValue)> {
    let by_name: HashMap<&str, &TaskSpec> =
        pipeline.tasks.iter().map(|t| (t.name.as_str(), t)).collect();

    // Reverse-dependency map: for each task, who depends on it.
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut remaining: HashMap<&str, usize> = HashMap::new();
    for spec in &pipeline.tasks {
        remaining.insert(&spec.name, spec.task.inputs().len());
        for input in spec.task.inputs() {
            dependents.entry(input.as_str()).or_default().push(&spec.name);
        }
    }

    let mut ready: VecDeque<&str> = remaining
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&name, _)| name)
        .collect();

    let mut results: HashMap<String, TaskValue> = HashMap::new();
    let mut frames = Vec::new();
    let mut executed = 0usize;
    let mut final_value = TaskValue::Empty;

    while let Some(name) = ready.pop_front() {
        let spec = by_name
            .get(name)
            .ok_or_else(|| OrchestratorError::TaskNotFound(name.to_string()))?;

        let inputs: Vec<TaskValue> = if spec.task.inputs().is_empty() {
            vec![seed_input.clone_for_seed()]
        } else {
            spec.task
                .inputs()
                .iter()
                .map(|dep| results.get(dep).cloned().unwrap_or(TaskValue::Empty))
                .collect()
        };

        let inputs = if spec.task.merges_inputs() && inputs.len() == 2 {
            vec![TaskValue::merge(inputs[0].clone(), inputs[1].clone())]
        } else {
            inputs
        };

        let ctx = TaskContext {
            pipeline_name: pipeline.name.clone(),
            pipeline_id: pipeline.pipeline_id,
            run_id,
            task_name: name.to_string(),
        };

        debug!("Running task {} (pipeline {}, run {})", name, pipeline.name, run_id);
        let mut output = spec.task.run(inputs, &ctx).await.map_err(|e| {
            OrchestratorError::task_execution(name, e)
        })?;

        // Provenance stamping (spec 4.6): stamp every DataPoint in this
        // task's output before it reaches downstream tasks. Monotonic per
        // `DataPointBase::stamp_provenance`.
        match &mut output {
            TaskValue::Nodes(nodes) => {
                cognee_ir::stamp_provenance_all(nodes, &pipeline.name, name);
            }
            TaskValue::NodesWithEdges(nodes, _) => {
                cognee_ir::stamp_provenance_all(nodes, &pipeline.name, name);
            }
            TaskValue::Empty | TaskValue::Raw(_) => {}
        }

        results.insert(name.to_string(), output.clone());
        final_value = output;
        executed += 1;
        frames.push(TaskExecutionInfo {
            task_name: name.to_string(),
            is_done: true,
        });

        if let Some(deps) = dependents.get(name) {
            for &dependent in deps {
                let counter = remaining.get_mut(dependent).unwrap();
                *counter -= 1;
                if *counter == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if executed != pipeline.tasks.len() {
        warn!(
            "Pipeline {} executed {}/{} tasks before the ready queue drained - cycle or orphan dependency",
            pipeline.name,
            executed,
            pipeline.tasks.len()
        );
        return Err(OrchestratorError::WrongTaskOrder);
    }

    Ok((frames, final_value))
}

impl TaskValue {
    fn clone_for_seed(&self) -> TaskValue {
        self.clone()
    }
}

impl Clone for Pipeline {
    fn clone(&self) -> Self {
        Pipeline {
            name: self.name.clone(),
            pipeline_id: self.pipeline_id,
            tasks: self
                .tasks
                .iter()
                .map(|t| TaskSpec {
                    name: t.name.clone(),
                    task: t.task.clone(),
                })
                .collect(),
        }
    }
}
