//! Plan files.
//!
//! A plan lists task configurations to replicate, each with its baseline
//! parameters and either an explicit option list or a parameter grid:
//!
//! ```yaml
//! tasks:
//!   - id: sort-bench
//!     replications: 20
//!     command: ./bench.sh
//!     timeout-ms: 30000
//!     baseline:
//!       n: 100000
//!       algo: { name: merge }
//!     options:
//!       - name: quick
//!         factories: [quicksort]
//!         overrides: { algo: { name: quick } }
//!       - name: heap
//!         overrides: { algo: { name: heap } }
//!   - id: solver
//!     grid:
//!       solver.name: [cg, gmres]
//!       solver.tol: [0.1, 0.01]
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{CandidateOption, Params, TaskConfig, TaskConfigId};
use crate::error::{ReplicatorError, Result};
use crate::options::{GridAxis, GridOptionGenerator, OptionGenerator, StaticOptionGenerator};

fn default_replications() -> usize {
    10
}

/// One task configuration in a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlanTask {
    pub id: String,

    #[serde(default = "default_replications")]
    pub replications: usize,

    #[serde(default)]
    pub min_replications: Option<usize>,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub baseline: Params,

    #[serde(default)]
    pub options: Option<Vec<CandidateOption>>,

    /// Parameter path to its alternatives, in file order.
    #[serde(default)]
    pub grid: Option<serde_yaml::Mapping>,
}

impl PlanTask {
    pub fn task_config(&self) -> TaskConfig {
        TaskConfig {
            id: TaskConfigId::new(self.id.clone()),
            baseline: self.baseline.clone(),
            min_replications: self.min_replications,
            command: self.command.clone(),
            timeout_ms: self.timeout_ms,
        }
    }

    fn option_source(&self) -> Result<OptionSource> {
        match (&self.options, &self.grid) {
            (Some(_), Some(_)) => Err(ReplicatorError::Plan(format!(
                "task {} has both options and grid",
                self.id
            ))),
            (Some(options), None) => Ok(OptionSource::List(StaticOptionGenerator::new(options.clone()))),
            (None, Some(grid)) => Ok(OptionSource::Grid(GridOptionGenerator::new(grid_axes(&self.id, grid)?))),
            (None, None) => Err(ReplicatorError::Plan(format!(
                "task {} needs options or grid",
                self.id
            ))),
        }
    }
}

fn grid_axes(task: &str, grid: &serde_yaml::Mapping) -> Result<Vec<GridAxis>> {
    let mut axes = Vec::with_capacity(grid.len());
    for (key, values) in grid {
        let Some(path) = key.as_str() else {
            return Err(ReplicatorError::Plan(format!("task {}: grid keys must be strings", task)));
        };
        match serde_json::to_value(values)? {
            Value::Array(values) => axes.push(GridAxis::new(path, values)),
            _ => {
                return Err(ReplicatorError::Plan(format!(
                    "task {}: grid entry {} must be a list",
                    task, path
                )));
            }
        }
    }
    Ok(axes)
}

/// A parsed, validated plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub tasks: Vec<PlanTask>,
}

impl Plan {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let plan: Self = serde_yaml::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Ids must be non-empty and unique; every task needs a valid option source.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.id.trim().is_empty() {
                return Err(ReplicatorError::Plan("task id must not be empty".to_string()));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(ReplicatorError::Plan(format!("duplicate task id {}", task.id)));
            }
            task.option_source()?;
        }
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&PlanTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Every task, or only `id` when given.
    pub fn select(&self, id: Option<&str>) -> Result<Vec<&PlanTask>> {
        match id {
            None => Ok(self.tasks.iter().collect()),
            Some(id) => self
                .find(id)
                .map(|t| vec![t])
                .ok_or_else(|| ReplicatorError::Plan(format!("no task {} in plan", id))),
        }
    }

    /// Option generator answering for every task in the plan.
    pub fn option_generator(&self) -> Result<PlanOptionGenerator> {
        let mut sources = HashMap::with_capacity(self.tasks.len());
        for task in &self.tasks {
            sources.insert(TaskConfigId::new(task.id.clone()), task.option_source()?);
        }
        Ok(PlanOptionGenerator { sources })
    }
}

#[derive(Debug, Clone)]
enum OptionSource {
    List(StaticOptionGenerator),
    Grid(GridOptionGenerator),
}

/// Generates options from a plan, keyed by task id.
///
/// Unknown ids get no options.
#[derive(Debug, Clone)]
pub struct PlanOptionGenerator {
    sources: HashMap<TaskConfigId, OptionSource>,
}

#[async_trait]
impl OptionGenerator for PlanOptionGenerator {
    async fn generate(&self, task: &TaskConfig) -> Result<Vec<CandidateOption>> {
        match self.sources.get(&task.id) {
            Some(OptionSource::List(list)) => list.generate(task).await,
            Some(OptionSource::Grid(grid)) => grid.generate(task).await,
            None => {
                tracing::debug!(task = %task.id, "Task not in plan");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PLAN: &str = r#"
tasks:
  - id: sort
    replications: 4
    min-replications: 1
    command: "echo cost=1"
    timeout-ms: 2000
    baseline:
      n: 100
      algo:
        name: merge
    options:
      - name: quick
        factories: [quicksort]
        overrides:
          algo:
            name: quick
      - name: heap
        overrides:
          algo: { name: heap }
  - id: solver
    grid:
      solver.name: [cg, gmres]
      solver.tol: [0.1, 0.01]
"#;

    #[test]
    fn test_parse_plan() {
        let plan = Plan::parse(PLAN).unwrap();
        assert_eq!(plan.tasks.len(), 2);

        let sort = plan.find("sort").unwrap();
        assert_eq!(sort.replications, 4);
        let config = sort.task_config();
        assert_eq!(config.min_replications, Some(1));
        assert_eq!(config.command.as_deref(), Some("echo cost=1"));
        assert_eq!(config.timeout_ms, Some(2000));
        assert_eq!(config.baseline.get_path("algo.name"), Some(&json!("merge")));

        let solver = plan.find("solver").unwrap();
        assert_eq!(solver.replications, 10);
        assert!(solver.command.is_none());
    }

    #[tokio::test]
    async fn test_generator_routes_by_task() {
        let plan = Plan::parse(PLAN).unwrap();
        let generator = plan.option_generator().unwrap();

        let sort = generator.generate(&plan.find("sort").unwrap().task_config()).await.unwrap();
        assert_eq!(sort.len(), 2);
        assert_eq!(sort[0].factories, vec!["quicksort"]);

        let solver = generator.generate(&plan.find("solver").unwrap().task_config()).await.unwrap();
        let names: Vec<&str> = solver.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names[0], "solver.name=cg,solver.tol=0.1");
        assert_eq!(names[3], "solver.name=gmres,solver.tol=0.01");

        let unknown = TaskConfig::new("nope", Params::new());
        assert!(generator.generate(&unknown).await.unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = "tasks:\n  - id: a\n    options: []\n  - id: a\n    options: []\n";
        assert!(matches!(Plan::parse(yaml), Err(ReplicatorError::Plan(_))));
    }

    #[test]
    fn test_empty_id_rejected() {
        let yaml = "tasks:\n  - id: ' '\n    options: []\n";
        assert!(matches!(Plan::parse(yaml), Err(ReplicatorError::Plan(_))));
    }

    #[test]
    fn test_options_and_grid_exclusive() {
        let yaml = "tasks:\n  - id: a\n    options: []\n    grid:\n      x: [1]\n";
        assert!(matches!(Plan::parse(yaml), Err(ReplicatorError::Plan(_))));
        let yaml = "tasks:\n  - id: a\n";
        assert!(matches!(Plan::parse(yaml), Err(ReplicatorError::Plan(_))));
    }

    #[test]
    fn test_grid_entry_must_be_list() {
        let yaml = "tasks:\n  - id: a\n    grid:\n      x: 3\n";
        assert!(matches!(Plan::parse(yaml), Err(ReplicatorError::Plan(_))));
    }

    #[test]
    fn test_select() {
        let plan = Plan::parse(PLAN).unwrap();
        assert_eq!(plan.select(None).unwrap().len(), 2);
        assert_eq!(plan.select(Some("solver")).unwrap()[0].id, "solver");
        assert!(plan.select(Some("missing")).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PLAN.as_bytes()).unwrap();
        let plan = Plan::load(file.path()).unwrap();
        assert_eq!(plan.tasks.len(), 2);
    }
}
