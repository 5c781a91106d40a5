//! Candidate option generation.
//!
//! An [`OptionGenerator`] produces the finite, ordered option set for a task
//! configuration. It is called once per task configuration, the first time
//! that configuration is scheduled; indices into the returned list are the
//! option identities for the rest of the record's life.

mod grid;
mod static_list;

use async_trait::async_trait;

use crate::domain::{CandidateOption, TaskConfig};
use crate::error::Result;

pub use grid::{GridAxis, GridOptionGenerator};
pub use static_list::StaticOptionGenerator;

/// Produces the candidate options for a task configuration.
#[async_trait]
pub trait OptionGenerator: Send + Sync {
    /// Generate the ordered option list. An empty list is not an error here;
    /// the scheduler reports it as "no options".
    async fn generate(&self, task: &TaskConfig) -> Result<Vec<CandidateOption>>;
}

/// Adapts a plain function into an [`OptionGenerator`].
pub struct FnOptionGenerator<F> {
    f: F,
}

impl<F> FnOptionGenerator<F>
where
    F: Fn(&TaskConfig) -> Result<Vec<CandidateOption>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> OptionGenerator for FnOptionGenerator<F>
where
    F: Fn(&TaskConfig) -> Result<Vec<CandidateOption>> + Send + Sync,
{
    async fn generate(&self, task: &TaskConfig) -> Result<Vec<CandidateOption>> {
        (self.f)(task)
    }
}
