//! Fixed option lists.

use async_trait::async_trait;

use super::OptionGenerator;
use crate::domain::{CandidateOption, TaskConfig};
use crate::error::Result;

/// Hands out the same ordered list for every task configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticOptionGenerator {
    options: Vec<CandidateOption>,
}

impl StaticOptionGenerator {
    pub fn new(options: Vec<CandidateOption>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &[CandidateOption] {
        &self.options
    }
}

#[async_trait]
impl OptionGenerator for StaticOptionGenerator {
    async fn generate(&self, _task: &TaskConfig) -> Result<Vec<CandidateOption>> {
        Ok(self.options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Params;

    #[tokio::test]
    async fn test_preserves_order() {
        let generator = StaticOptionGenerator::new(vec![
            CandidateOption::new("b", Params::new()),
            CandidateOption::new("a", Params::new()),
        ]);
        let task = TaskConfig::new("t", Params::new());
        let names: Vec<String> = generator
            .generate(&task)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_empty_list() {
        let generator = StaticOptionGenerator::default();
        let task = TaskConfig::new("t", Params::new());
        assert!(generator.generate(&task).await.unwrap().is_empty());
    }
}
