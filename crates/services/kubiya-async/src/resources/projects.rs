use serde_json::{Map, Value, json};
use std::time::Duration;

use super::rewrap;
use crate::{
    client::Client,
    config::Config,
    error::KubiyaError,
    router::Endpoint,
    types::project::{
        CreateProject, CreateProjectBody, Execution, Plan, PlanOutcome, Project, ProjectTemplate,
        UpdateProject, UpdateProjectBody, log_lines,
    },
};

/// API resource for projects, their templates, plans and executions
pub struct Projects<'c, C: Config> {
    client: &'c Client<C>,
}

impl<'c, C: Config> Projects<'c, C> {
    /// Creates a new Projects resource
    #[must_use]
    pub const fn new(client: &'c Client<C>) -> Self {
        Self { client }
    }

    /// Lists projects
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if the request fails.
    pub async fn list(&self) -> Result<Vec<Project>, KubiyaError> {
        let path = Endpoint::ProjectList.path(&[])?;
        self.client
            .get(&path)
            .await
            .map_err(|e| rewrap(e, |e| KubiyaError::project("Failed to list projects", None, e)))
    }

    /// Project by id
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if the request fails.
    pub async fn describe(&self, project_id: &str) -> Result<Project, KubiyaError> {
        let path = Endpoint::ProjectGet.path(&[("project_id", project_id)])?;
        self.client.get(&path).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::project("Failed to get project", Some(project_id), e)
            })
        })
    }

    /// Creates a project
    ///
    /// Variables are merged in order: plain, sensitive, then the variables
    /// file. With a template and validation enabled, every required template
    /// variable must be supplied and every template secret's environment
    /// variable must be set.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing missing variables or environment
    /// variables, or [`KubiyaError::Project`] if a request or the variables
    /// file fails.
    pub async fn create(&self, request: CreateProject) -> Result<Value, KubiyaError> {
        let CreateProject {
            name,
            template_id,
            description,
            mut variables,
            sensitive_variables,
            variables_file,
            skip_var_validation,
        } = request;

        variables.extend(sensitive_variables);
        if let Some(path) = variables_file {
            let text = tokio::fs::read_to_string(&path).await.map_err(|e| KubiyaError::Project {
                message: format!("Failed to read variables file {}: {e}", path.display()),
                project_id: None,
            })?;
            let from_file: Map<String, Value> =
                serde_json::from_str(&text).map_err(|e| KubiyaError::Project {
                    message: format!("Invalid variables file {}: {e}", path.display()),
                    project_id: None,
                })?;
            variables.extend(from_file);
        }

        if let Some(template_id) = template_id.as_deref().filter(|_| !skip_var_validation) {
            let template = self.template(template_id).await?;
            check_template(&template, &variables)?;
        }

        let body = CreateProjectBody {
            name,
            usecase_id: template_id,
            description: description.unwrap_or_default(),
            variables,
        };
        let path = Endpoint::ProjectCreate.path(&[])?;
        self.client
            .post(&path, body)
            .await
            .map_err(|e| rewrap(e, |e| KubiyaError::project("Failed to create project", None, e)))
    }

    /// Updates a project, keeping current values for anything not given
    ///
    /// New variables are merged over the project's current ones.
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if a request fails.
    pub async fn update(
        &self,
        project_id: &str,
        request: UpdateProject,
    ) -> Result<Value, KubiyaError> {
        let current = self.describe(project_id).await?;

        let mut variables: Map<String, Value> = current
            .variables
            .into_iter()
            .filter_map(|v| v.name.filter(|n| !n.is_empty()).map(|n| (n, v.value)))
            .collect();
        variables.extend(request.variables);

        let body = UpdateProjectBody {
            name: request.name.or(Some(current.name)),
            description: request.description.or(current.description),
            variables,
        };
        let path = Endpoint::ProjectUpdate.path(&[("project_id", project_id)])?;
        self.client.put(&path, body).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::project("Failed to update project", Some(project_id), e)
            })
        })
    }

    /// Deletes a project
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if the request fails.
    pub async fn delete(&self, project_id: &str) -> Result<Value, KubiyaError> {
        let path = Endpoint::ProjectDelete.path(&[("project_id", project_id)])?;
        self.client.delete(&path).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::project("Failed to delete project", Some(project_id), e)
            })
        })
    }

    /// Lists project templates, optionally from one repository
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if the request fails.
    pub async fn templates(
        &self,
        repository: Option<&str>,
    ) -> Result<Vec<ProjectTemplate>, KubiyaError> {
        let path = Endpoint::ProjectTemplatesList.path(&[])?;
        let query: Vec<(&str, String)> = repository
            .map(|r| vec![("repository", r.to_string())])
            .unwrap_or_default();
        self.client.get_with_query(&path, &query).await.map_err(|e| {
            rewrap(e, |e| KubiyaError::project("Failed to list templates", None, e))
        })
    }

    /// Template by id
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if the request fails.
    pub async fn template(&self, template_id: &str) -> Result<ProjectTemplate, KubiyaError> {
        let path = Endpoint::ProjectTemplateGet.path(&[("template_id", template_id)])?;
        self.client.get(&path).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::project(&format!("Failed to get template {template_id}"), None, e)
            })
        })
    }

    /// Creates a plan for a project
    ///
    /// With `auto_approve`, a plan that has changes is approved right away
    /// and the started execution is returned instead.
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if a request fails.
    pub async fn plan(
        &self,
        project_id: &str,
        auto_approve: bool,
    ) -> Result<PlanOutcome, KubiyaError> {
        let path = Endpoint::ProjectPlanCreate.path(&[("project_id", project_id)])?;
        let plan: Plan = self
            .client
            .post(&path, json!({ "project_id": project_id }))
            .await
            .map_err(|e| {
                rewrap(e, |e| {
                    KubiyaError::project("Failed to create plan", Some(project_id), e)
                })
            })?;

        match plan.plan_id.as_deref() {
            Some(plan_id) if auto_approve && plan.has_changes() => {
                tracing::info!(project = project_id, plan = plan_id, "auto-approving plan");
                self.approve(plan_id).await.map(PlanOutcome::Approved)
            }
            _ => Ok(PlanOutcome::Planned(plan)),
        }
    }

    /// Approves a plan and returns the started execution
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if the request fails.
    pub async fn approve(&self, plan_id: &str) -> Result<Execution, KubiyaError> {
        let path = Endpoint::ProjectPlanApprove.path(&[("plan_id", plan_id)])?;
        self.client
            .put(&path, json!({ "action": "approve" }))
            .await
            .map_err(|e| {
                rewrap(e, |e| {
                    KubiyaError::project(&format!("Failed to approve plan {plan_id}"), None, e)
                })
            })
    }

    /// Execution by id
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if the request fails.
    pub async fn execution(&self, execution_id: &str) -> Result<Execution, KubiyaError> {
        let path = Endpoint::ProjectExecutionGet.path(&[("execution_id", execution_id)])?;
        self.client.get(&path).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::project(&format!("Failed to get execution {execution_id}"), None, e)
            })
        })
    }

    /// Log lines of an execution so far
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Project`] if the request fails.
    pub async fn execution_logs(&self, execution_id: &str) -> Result<Vec<String>, KubiyaError> {
        let path = Endpoint::ProjectExecutionLogs.path(&[("execution_id", execution_id)])?;
        let logs: Value = self.client.get(&path).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::project(
                    &format!("Failed to get logs for execution {execution_id}"),
                    None,
                    e,
                )
            })
        })?;
        Ok(log_lines(logs))
    }

    /// Polls an execution until it completes or fails
    ///
    /// Each round sleeps for `interval`, then logs any new lines at `info`.
    /// Returns the final execution.
    ///
    /// # Errors
    ///
    /// Returns the first request error.
    pub async fn follow_execution(
        &self,
        execution_id: &str,
        interval: Duration,
    ) -> Result<Execution, KubiyaError> {
        let mut seen = 0;
        loop {
            tokio::time::sleep(interval).await;

            let execution = self.execution(execution_id).await?;
            let logs = self.execution_logs(execution_id).await?;
            for line in logs.iter().skip(seen) {
                tracing::info!(execution = execution_id, "{line}");
            }
            seen = seen.max(logs.len());

            if execution.is_finished() {
                if execution.succeeded() {
                    tracing::info!(execution = execution_id, "Execution completed");
                } else {
                    tracing::error!(execution = execution_id, "Execution failed");
                }
                return Ok(execution);
            }
        }
    }
}

/// Checks supplied variables and the environment against a template
fn check_template(
    template: &ProjectTemplate,
    variables: &Map<String, Value>,
) -> Result<(), KubiyaError> {
    let missing: Vec<&str> = template
        .required_variables()
        .into_iter()
        .filter(|name| !variables.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(KubiyaError::validation(
            format!("Missing required variables: {}", missing.join(", ")),
            "variables",
        ));
    }

    let missing_env: Vec<&str> = template
        .secrets
        .iter()
        .filter_map(|s| s.env_var())
        .filter(|var| !std::env::var(var).is_ok_and(|v| !v.is_empty()))
        .collect();
    if !missing_env.is_empty() {
        return Err(KubiyaError::validation(
            format!(
                "Missing required environment variables for secrets: {}",
                missing_env.join(", ")
            ),
            "secrets",
        ));
    }
    Ok(())
}

impl<C: Config> crate::Client<C> {
    /// Returns the Projects API resource
    #[must_use]
    pub const fn projects(&self) -> Projects<'_, C> {
        Projects::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EnvGuard;
    use crate::types::project::{TemplateSecret, TemplateVariable};
    use serial_test::serial;

    fn template() -> ProjectTemplate {
        ProjectTemplate {
            variables: vec![TemplateVariable {
                name: "region".into(),
                required: true,
                default: None,
            }],
            secrets: vec![TemplateSecret {
                name: Some("aws".into()),
                to_env: Some("KUBIYA_TEST_AWS_KEY".into()),
            }],
            ..ProjectTemplate::default()
        }
    }

    #[test]
    #[serial(env)]
    fn reports_missing_variables_first() {
        let _env = EnvGuard::remove("KUBIYA_TEST_AWS_KEY");
        let err = check_template(&template(), &Map::new()).unwrap_err();
        assert!(err.to_string().contains("Missing required variables: region"));
    }

    #[test]
    #[serial(env)]
    fn reports_missing_secret_env() {
        let _env = EnvGuard::set("KUBIYA_TEST_AWS_KEY", "");
        let mut vars = Map::new();
        vars.insert("region".into(), json!("us-east-1"));
        let err = check_template(&template(), &vars).unwrap_err();
        assert!(
            err.to_string()
                .contains("Missing required environment variables for secrets: KUBIYA_TEST_AWS_KEY")
        );
    }

    #[test]
    #[serial(env)]
    fn passes_when_everything_is_set() {
        let _env = EnvGuard::set("KUBIYA_TEST_AWS_KEY", "x");
        let mut vars = Map::new();
        vars.insert("region".into(), json!("us-east-1"));
        assert!(check_template(&template(), &vars).is_ok());
    }
}
