//! Environment (Rancher project) selection and URL scoping.

use tracing::{debug, info};

use crate::api::{Connector, ProjectFilter, RancherApi};
use crate::rancher::{ApiError, Project};
use crate::ssh_key::KeyGenerator;

use super::{Driver, DriverError};

/// Two results are enough to tell "exactly one" from "several".
const SELECTION_LIMIT: u32 = 2;

impl<C, K> Driver<C, K>
where
    C: Connector,
    K: KeyGenerator,
{
    /// Resolves the target environment and scopes the API URL to it.
    ///
    /// The configured URL is replaced by the project's `self` link and the
    /// API handle is rebuilt against it, so an unreachable scoped endpoint is
    /// reported here rather than during creation.
    ///
    /// # Errors
    ///
    /// Returns a selection error from [`DriverError`] when no single
    /// environment matches, or the underlying API error.
    pub async fn pre_create_check(&mut self) -> Result<(), DriverError> {
        let api = self.api().await?;
        let project = self.select_project(&api).await?;
        let scoped = project
            .self_link()
            .ok_or_else(|| DriverError::MissingProjectLink {
                id: project.id.clone(),
            })?
            .to_owned();

        info!(project = %project.id, name = %project.name, url = %scoped, "selected environment");
        self.rescope(&scoped);
        self.api().await?;
        Ok(())
    }

    async fn select_project(&self, api: &C::Api) -> Result<Project, DriverError> {
        if let Some(id) = &self.config.project_id {
            debug!(%id, "looking up environment by id");
            return api.get_project(id).await.map_err(|err| match err {
                ApiError::NotFound { .. } => DriverError::ProjectNotFound { id: id.clone() },
                other => DriverError::Api(other),
            });
        }

        if let Some(name) = &self.config.project_name {
            debug!(%name, "looking up environment by name");
            let filter = ProjectFilter::named(name.as_str(), SELECTION_LIMIT);
            let projects = api.list_projects(&filter).await?;
            return single(projects).map_err(|found| match found {
                Found::None => DriverError::NoEnvironmentNamed { name: name.clone() },
                Found::Many => DriverError::AmbiguousEnvironmentName { name: name.clone() },
            });
        }

        let projects = api.list_projects(&ProjectFilter::all(SELECTION_LIMIT)).await?;
        single(projects).map_err(|found| match found {
            Found::None => DriverError::NoEnvironments,
            Found::Many => DriverError::AmbiguousCredentials,
        })
    }
}

enum Found {
    None,
    Many,
}

fn single(mut projects: Vec<Project>) -> Result<Project, Found> {
    match projects.len() {
        0 => Err(Found::None),
        1 => projects.pop().ok_or(Found::None),
        _ => Err(Found::Many),
    }
}
