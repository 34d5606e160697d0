/// Environment detection for a URL
///
/// Hosts are matched by suffix: an environment `example.com` matches both
/// `example.com` and `staging.example.com`. Projects and environments are
/// searched in array order and the first match wins.

use crate::pin::PinKey;
use crate::settings::{Environment, Project, Settings};
use url::Url;

/// The project/environment a URL belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentMatch<'a> {
    pub project: &'a Project,
    pub environment: &'a Environment,
    pub project_index: usize,
    pub environment_index: usize,
}

impl EnvironmentMatch<'_> {
    pub fn pin_key(&self) -> PinKey {
        PinKey::new(self.project_index, self.environment_index)
    }
}

/// Find the environment whose `domain.tld` the URL's host ends with.
///
/// This is a pure lookup; selecting the matched project is left to the
/// caller (`Settings::select_project`).
pub fn match_url<'a>(url: &Url, settings: &'a Settings) -> Option<EnvironmentMatch<'a>> {
    url.host_str().and_then(|host| match_host(host, settings))
}

/// Same as `match_url` for a bare host name
pub fn match_host<'a>(host: &str, settings: &'a Settings) -> Option<EnvironmentMatch<'a>> {
    settings
        .projects
        .iter()
        .enumerate()
        .find_map(|(project_index, project)| {
            project
                .environments
                .iter()
                .position(|env| host.ends_with(&env.host()))
                .map(|environment_index| EnvironmentMatch {
                    project,
                    environment: &project.environments[environment_index],
                    project_index,
                    environment_index,
                })
        })
}
