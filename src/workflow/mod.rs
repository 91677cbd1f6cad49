//! Wizard workflow
//!
//! The interactive wizard walks through three steps: download a package,
//! pick one of its configurations, then build and deploy it. All progress
//! lives in [`WorkflowState`]; [`WorkflowState::apply`] is the only way to
//! move between steps, and it rejects events that make no sense in the
//! current step.

use std::fmt;

use log::debug;
use serde::Serialize;

use crate::cache::CacheKey;
use crate::error::WorkflowError;
use crate::package::PackageDescriptor;
use crate::toolkit::RunOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    Download,
    SelectConfig,
    BuildDeploy,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Download, Step::SelectConfig, Step::BuildDeploy];

    /// 1-based position, for "Step n of 3" headers
    pub fn number(self) -> usize {
        match self {
            Step::Download => 1,
            Step::SelectConfig => 2,
            Step::BuildDeploy => 3,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Download => "download",
            Step::SelectConfig => "select configuration",
            Step::BuildDeploy => "build & deploy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    /// A package was fetched (or re-fetched)
    PackageLoaded {
        key: CacheKey,
        descriptor: PackageDescriptor,
    },
    ConfigSelected(String),
    /// A toolkit run completed
    RunFinished(RunOutput),
    Back,
    Reset,
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::PackageLoaded { .. } => "load a package",
            Event::ConfigSelected(_) => "select a configuration",
            Event::RunFinished(_) => "record a run",
            Event::Back => "go back",
            Event::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub step: Step,
    pub package: Option<CacheKey>,
    pub descriptor: Option<PackageDescriptor>,
    pub selected_config: Option<String>,
    pub last_run: Option<RunOutput>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            step: Step::Download,
            package: None,
            descriptor: None,
            selected_config: None,
            last_run: None,
        }
    }

    /// Apply an event, moving to the next step. On error the state is
    /// left untouched.
    pub fn apply(&mut self, event: Event) -> Result<Step, WorkflowError> {
        match (self.step, event) {
            (_, Event::Reset) => {
                *self = Self::new();
            }
            (Step::Download | Step::SelectConfig, Event::PackageLoaded { key, descriptor }) => {
                self.package = Some(key);
                self.descriptor = Some(descriptor);
                self.selected_config = None;
                self.last_run = None;
                self.step = Step::SelectConfig;
            }
            (Step::SelectConfig, Event::ConfigSelected(config)) => {
                let known = self
                    .descriptor
                    .as_ref()
                    .is_some_and(|d| d.has_config(&config));
                if !known {
                    return Err(WorkflowError::UnknownConfig(config));
                }
                self.selected_config = Some(config);
                self.step = Step::BuildDeploy;
            }
            (Step::BuildDeploy, Event::RunFinished(output)) => {
                self.last_run = Some(output);
            }
            (Step::SelectConfig, Event::Back) => {
                self.step = Step::Download;
            }
            (Step::BuildDeploy, Event::Back) => {
                self.selected_config = None;
                self.last_run = None;
                self.step = Step::SelectConfig;
            }
            (from, event) => {
                return Err(WorkflowError::InvalidTransition {
                    from: from.to_string(),
                    event: event.name().to_string(),
                });
            }
        }
        Ok(self.step)
    }

    /// Whether the prerequisites for `step` are satisfied
    pub fn can_enter(&self, step: Step) -> bool {
        match step {
            Step::Download => true,
            Step::SelectConfig => self.descriptor.is_some(),
            Step::BuildDeploy => self.descriptor.is_some() && self.selected_config.is_some(),
        }
    }

    /// Fall back to a fresh start when the current step's prerequisites are
    /// gone. Returns the step to render.
    pub fn settle(&mut self) -> Step {
        if !self.can_enter(self.step) {
            debug!("Cannot stay in the {} step, starting over", self.step);
            *self = Self::new();
        }
        self.step
    }

    /// README text for the selected configuration
    pub fn selected_readme(&self) -> Option<&str> {
        let config = self.selected_config.as_deref()?;
        self.descriptor.as_ref()?.readme_for(config)
    }
}
