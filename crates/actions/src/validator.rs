//! Plan validation — checks every proposed action call against the registry.
//!
//! Validation collects all defects across the whole plan rather than
//! stopping at the first, so a rejected plan comes back with a complete
//! list the planner can act on in its next attempt. Accepting a plan never
//! changes it: validating an accepted plan again yields the same result.

use hopdesk_core::{ActionCall, ActionRegistry, ValidationError};

/// A single problem found in a proposed plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDefect {
    /// Index of the offending call within the plan.
    pub index: usize,
    /// Name of the action as proposed.
    pub action: String,
    /// What was wrong with it.
    pub error: ValidationError,
}

/// A rejected plan, carrying every defect found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("plan rejected with {} defect(s)", .defects.len())]
pub struct PlanRejection {
    pub defects: Vec<PlanDefect>,
}

impl PlanRejection {
    /// A human-readable summary, one line per defect.
    pub fn summary(&self) -> String {
        self.defects
            .iter()
            .map(|d| format!("call {}: {}", d.index, d.error))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validates proposed plans against an action registry.
#[derive(Debug, Clone)]
pub struct PlanValidator {
    registry: ActionRegistry,
}

impl PlanValidator {
    pub fn new(registry: ActionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Check every call in a proposed plan.
    ///
    /// Returns `Ok(())` when the plan is acceptable as-is. Unknown actions,
    /// missing required parameters, wrong parameter types, and empty string
    /// parameters are all defects. Extra parameters are permitted.
    pub fn validate(&self, plan: &[ActionCall]) -> Result<(), PlanRejection> {
        let mut defects = Vec::new();

        for (index, call) in plan.iter().enumerate() {
            let Some(signature) = self.registry.get(&call.name) else {
                defects.push(PlanDefect {
                    index,
                    action: call.name.clone(),
                    error: ValidationError::UnknownAction(call.name.clone()),
                });
                continue;
            };

            for spec in &signature.required {
                match call.parameters.get(&spec.name) {
                    None => defects.push(PlanDefect {
                        index,
                        action: call.name.clone(),
                        error: ValidationError::MissingParameter {
                            action: call.name.clone(),
                            parameter: spec.name.clone(),
                        },
                    }),
                    Some(value) if !spec.kind.matches(value) => defects.push(PlanDefect {
                        index,
                        action: call.name.clone(),
                        error: ValidationError::WrongParameterType {
                            action: call.name.clone(),
                            parameter: spec.name.clone(),
                            expected: spec.kind.as_str().to_string(),
                        },
                    }),
                    Some(value) => {
                        // Required strings must carry content.
                        if value.as_str().is_some_and(|s| s.trim().is_empty()) {
                            defects.push(PlanDefect {
                                index,
                                action: call.name.clone(),
                                error: ValidationError::EmptyParameter {
                                    action: call.name.clone(),
                                    parameter: spec.name.clone(),
                                },
                            });
                        }
                    }
                }
            }
        }

        if defects.is_empty() {
            Ok(())
        } else {
            tracing::debug!(defects = defects.len(), "plan rejected");
            Err(PlanRejection { defects })
        }
    }
}
