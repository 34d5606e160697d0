/// Project and environment configuration, as persisted in sync storage

use crate::error::{ImportError, SettingsError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_ENVIRONMENT_COLOR: &str = "#ffffff";
pub const NEW_PROJECT_COLOR: &str = "#ddff00";
pub const EXPORT_FILENAME: &str = "environment-switcher-settings.json";

/// Root settings object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, deserialize_with = "lenient_index")]
    pub selected_project_index: usize,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub projects: Vec<Project>,
}

/// A named group of environments belonging to one website
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub environments: Vec<Environment>,
}

/// One deployment target of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub domain: String,
    #[serde(default, deserialize_with = "lenient")]
    pub tld: String,
    #[serde(default, deserialize_with = "lenient")]
    pub color: String,
}

/// Editable fields of an environment row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentField {
    Name,
    Domain,
    Tld,
    Color,
}

impl Environment {
    pub fn new(name: impl Into<String>, domain: impl Into<String>, tld: impl Into<String>) -> Self {
        Environment {
            name: name.into(),
            domain: domain.into(),
            tld: tld.into(),
            color: DEFAULT_ENVIRONMENT_COLOR.to_string(),
        }
    }

    /// Host suffix `domain.tld` used for matching and link construction
    pub fn host(&self) -> String {
        format!("{}.{}", self.domain, self.tld)
    }

    /// Accent color, white when unset
    pub fn badge_color(&self) -> &str {
        if self.color.is_empty() {
            DEFAULT_ENVIRONMENT_COLOR
        } else {
            &self.color
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.domain.is_empty() && !self.tld.is_empty()
    }
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Project {
            name: name.into(),
            color: Some(DEFAULT_ENVIRONMENT_COLOR.to_string()),
            environments: Vec::new(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Settings {
            selected_project_index: 0,
            projects: vec![Project::new("Project 1")],
        }
    }

    /// Parse an exported settings file. Only the presence of a `projects`
    /// array is checked; everything else is defaulted.
    pub fn from_import(json: &str) -> Result<Settings, ImportError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Settings::from_value(value)
    }

    /// Decode an already parsed settings object. Wrongly typed fields fall
    /// back to their defaults and unreadable list entries are skipped.
    pub fn from_value(value: serde_json::Value) -> Result<Settings, ImportError> {
        let object = value.as_object().ok_or(ImportError::NotAnObject)?;

        match object.get("projects") {
            Some(serde_json::Value::Array(_)) => {}
            _ => return Err(ImportError::MissingProjects),
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Replace these settings with an imported file; left untouched when
    /// the file is rejected
    pub fn replace_from_import(&mut self, json: &str) -> Result<(), ImportError> {
        *self = Settings::from_import(json)?;
        Ok(())
    }

    pub fn to_export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Selected project index, falling back to 0 when out of range
    pub fn selected_index(&self) -> usize {
        if self.selected_project_index < self.projects.len() {
            self.selected_project_index
        } else {
            0
        }
    }

    pub fn selected_project(&self) -> Option<&Project> {
        self.projects.get(self.selected_index())
    }

    pub fn select_project(&mut self, index: usize) -> Result<(), SettingsError> {
        if index >= self.projects.len() {
            return Err(SettingsError::ProjectNotFound(index));
        }
        self.selected_project_index = index;
        Ok(())
    }

    pub fn environment(&self, project: usize, environment: usize) -> Option<&Environment> {
        self.projects.get(project)?.environments.get(environment)
    }

    /// Append an empty project and return its index
    pub fn add_project(&mut self) -> usize {
        let index = self.projects.len();
        self.projects.push(Project {
            name: format!("New Project {}", index + 1),
            color: Some(NEW_PROJECT_COLOR.to_string()),
            environments: Vec::new(),
        });
        index
    }

    /// Append a project with a single prefilled environment and select it
    pub fn add_project_with_environment(&mut self, environment: Environment) -> usize {
        let index = self.projects.len();
        self.projects.push(Project {
            name: format!("Project {}", index + 1),
            color: None,
            environments: vec![environment],
        });
        self.selected_project_index = index;
        index
    }

    /// Remove a project. The last remaining project cannot be removed;
    /// selection resets to the first project.
    pub fn remove_project(&mut self, index: usize) -> Result<Project, SettingsError> {
        if self.projects.len() <= 1 {
            return Err(SettingsError::LastProject);
        }
        if index >= self.projects.len() {
            return Err(SettingsError::ProjectNotFound(index));
        }
        let removed = self.projects.remove(index);
        self.selected_project_index = 0;
        Ok(removed)
    }

    pub fn rename_project(&mut self, index: usize, name: String) -> Result<(), SettingsError> {
        self.project_mut(index)?.name = name;
        Ok(())
    }

    pub fn add_environment(&mut self, project: usize, environment: Environment) -> Result<usize, SettingsError> {
        if !environment.is_complete() {
            return Err(SettingsError::IncompleteEnvironment);
        }
        let environments = &mut self.project_mut(project)?.environments;
        environments.push(environment);
        Ok(environments.len() - 1)
    }

    pub fn remove_environment(&mut self, project: usize, environment: usize) -> Result<Environment, SettingsError> {
        let environments = &mut self.project_mut(project)?.environments;
        if environment >= environments.len() {
            return Err(SettingsError::EnvironmentNotFound { project, environment });
        }
        Ok(environments.remove(environment))
    }

    pub fn update_environment(
        &mut self,
        project: usize,
        environment: usize,
        field: EnvironmentField,
        value: String,
    ) -> Result<(), SettingsError> {
        let env = self
            .project_mut(project)?
            .environments
            .get_mut(environment)
            .ok_or(SettingsError::EnvironmentNotFound { project, environment })?;

        match field {
            EnvironmentField::Name => env.name = value,
            EnvironmentField::Domain => env.domain = value,
            EnvironmentField::Tld => env.tld = value,
            EnvironmentField::Color => env.color = value,
        }
        Ok(())
    }

    /// Move an environment to the insertion gap `to` (0..=len).
    ///
    /// Dropping an item directly above or below itself is a no-op. Returns
    /// whether the order changed.
    pub fn move_environment(&mut self, project: usize, from: usize, to: usize) -> Result<bool, SettingsError> {
        let environments = &mut self.project_mut(project)?.environments;
        if from >= environments.len() {
            return Err(SettingsError::EnvironmentNotFound { project, environment: from });
        }
        if to == from || to == from + 1 {
            return Ok(false);
        }

        let moved = environments.remove(from);
        let target = if to > from { to - 1 } else { to };
        environments.insert(target.min(environments.len()), moved);
        Ok(true)
    }

    /// Apply the request the settings page was opened with and return the
    /// project to show, plus whether settings changed and need saving.
    pub fn apply_open_request(&mut self, request: &OpenRequest) -> (usize, bool) {
        match request {
            OpenRequest::Selected => (self.selected_index(), false),
            OpenRequest::Project(index) => {
                self.selected_project_index = *index;
                (*index, false)
            }
            OpenRequest::NewProject { domain, tld, title } => {
                let index = self.add_project_with_environment(Environment::new(
                    title.clone(),
                    domain.clone(),
                    tld.clone(),
                ));
                (index, true)
            }
        }
    }

    fn project_mut(&mut self, index: usize) -> Result<&mut Project, SettingsError> {
        self.projects
            .get_mut(index)
            .ok_or(SettingsError::ProjectNotFound(index))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// What the settings page was asked to show, from its query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenRequest {
    Selected,
    Project(usize),
    NewProject { domain: String, tld: String, title: String },
}

impl OpenRequest {
    /// Parse a query string such as `project=2` or
    /// `project=new&domain=example&tld=test&title=ddev`
    pub fn parse(query: &str) -> OpenRequest {
        let query = query.trim_start_matches('?');
        let mut project = None;
        let mut domain = None;
        let mut tld = None;
        let mut title = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "project" => project = Some(value.into_owned()),
                "domain" => domain = Some(value.into_owned()),
                "tld" => tld = Some(value.into_owned()),
                "title" => title = Some(value.into_owned()),
                _ => {}
            }
        }

        match project.as_deref() {
            Some("new") => match (domain, tld, title) {
                (Some(domain), Some(tld), Some(title))
                    if !domain.is_empty() && !tld.is_empty() && !title.is_empty() =>
                {
                    OpenRequest::NewProject { domain, tld, title }
                }
                _ => OpenRequest::Selected,
            },
            Some(index) => index
                .parse()
                .map(OpenRequest::Project)
                .unwrap_or(OpenRequest::Selected),
            None => OpenRequest::Selected,
        }
    }
}

/// Accepts numbers, numeric strings (select element values end up stored
/// as strings) and null; anything unreadable becomes 0.
fn lenient_index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IndexRepr {
        Number(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    let index = match IndexRepr::deserialize(deserializer)? {
        IndexRepr::Number(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
        IndexRepr::Text(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    Ok(index)
}

/// Null or a wrongly typed value becomes the default
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Anything but an array becomes empty; entries that do not decode are dropped
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_settings() -> Settings {
        Settings {
            selected_project_index: 0,
            projects: vec![Project {
                name: "Shop".to_string(),
                color: None,
                environments: vec![
                    Environment::new("A", "a", "test"),
                    Environment::new("B", "b", "test"),
                    Environment::new("C", "c", "test"),
                    Environment::new("D", "d", "test"),
                ],
            }],
        }
    }

    fn names(settings: &Settings) -> Vec<&str> {
        settings.projects[0]
            .environments
            .iter()
            .map(|e| e.name.as_str())
            .collect()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.selected_project_index, 0);
        assert_eq!(settings.projects.len(), 1);
        assert_eq!(settings.projects[0].name, "Project 1");
        assert!(settings.projects[0].environments.is_empty());
    }

    #[test]
    fn test_environment_host() {
        let env = Environment::new("Live", "www.example", "com");
        assert_eq!(env.host(), "www.example.com");
    }

    #[test]
    fn test_badge_color_defaults_to_white() {
        let mut env = Environment::new("Live", "example", "com");
        env.color = String::new();
        assert_eq!(env.badge_color(), "#ffffff");
        env.color = "#ff0000".to_string();
        assert_eq!(env.badge_color(), "#ff0000");
    }

    #[test]
    fn test_lenient_selected_index() {
        let json = r#"{"selectedProjectIndex": "2", "projects": []}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.selected_project_index, 2);

        let json = r#"{"selectedProjectIndex": null, "projects": []}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.selected_project_index, 0);

        let json = r#"{"selectedProjectIndex": -1, "projects": []}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.selected_project_index, 0);

        let json = r#"{"projects": []}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.selected_project_index, 0);
    }

    #[test]
    fn test_missing_fields_are_defaulted() {
        let json = r#"{"projects": [{"name": "P", "environments": [{"name": "Live", "domain": null}]}]}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        let env = &settings.projects[0].environments[0];
        assert_eq!(env.domain, "");
        assert_eq!(env.tld, "");
        assert_eq!(env.color, "");
    }

    #[test]
    fn test_selected_index_out_of_range_falls_back() {
        let mut settings = create_test_settings();
        settings.selected_project_index = 7;
        assert_eq!(settings.selected_index(), 0);
        assert_eq!(settings.selected_project().unwrap().name, "Shop");
    }

    #[test]
    fn test_select_project() {
        let mut settings = create_test_settings();
        settings.add_project();

        assert_eq!(settings.select_project(1), Ok(()));
        assert_eq!(settings.selected_project_index, 1);
        assert_eq!(settings.select_project(5), Err(SettingsError::ProjectNotFound(5)));
        assert_eq!(settings.selected_project_index, 1);
    }

    #[test]
    fn test_add_project() {
        let mut settings = create_test_settings();
        let index = settings.add_project();

        assert_eq!(index, 1);
        assert_eq!(settings.projects[1].name, "New Project 2");
        assert_eq!(settings.projects[1].color.as_deref(), Some("#ddff00"));
    }

    #[test]
    fn test_remove_project() {
        let mut settings = create_test_settings();
        settings.add_project();
        settings.selected_project_index = 1;

        let removed = settings.remove_project(0).unwrap();

        assert_eq!(removed.name, "Shop");
        assert_eq!(settings.projects.len(), 1);
        assert_eq!(settings.selected_project_index, 0);
    }

    #[test]
    fn test_remove_last_project_refused() {
        let mut settings = create_test_settings();
        assert_eq!(settings.remove_project(0), Err(SettingsError::LastProject));
        assert_eq!(settings.projects.len(), 1);
    }

    #[test]
    fn test_add_environment_requires_all_fields() {
        let mut settings = create_test_settings();

        let result = settings.add_environment(0, Environment::new("E", "", "test"));
        assert_eq!(result, Err(SettingsError::IncompleteEnvironment));
        assert_eq!(settings.projects[0].environments.len(), 4);

        let result = settings.add_environment(0, Environment::new("E", "e", "test"));
        assert_eq!(result, Ok(4));
        assert_eq!(settings.projects[0].environments[4].color, "#ffffff");
    }

    #[test]
    fn test_update_and_remove_environment() {
        let mut settings = create_test_settings();

        settings
            .update_environment(0, 1, EnvironmentField::Domain, "beta".to_string())
            .unwrap();
        assert_eq!(settings.projects[0].environments[1].host(), "beta.test");

        let removed = settings.remove_environment(0, 1).unwrap();
        assert_eq!(removed.name, "B");
        assert_eq!(names(&settings), vec!["A", "C", "D"]);

        assert_eq!(
            settings.remove_environment(0, 9),
            Err(SettingsError::EnvironmentNotFound { project: 0, environment: 9 })
        );
    }

    #[test]
    fn test_move_environment_down() {
        let mut settings = create_test_settings();
        // Drop A into the gap between C and D
        assert_eq!(settings.move_environment(0, 0, 3), Ok(true));
        assert_eq!(names(&settings), vec!["B", "C", "A", "D"]);
    }

    #[test]
    fn test_move_environment_up() {
        let mut settings = create_test_settings();
        assert_eq!(settings.move_environment(0, 3, 0), Ok(true));
        assert_eq!(names(&settings), vec!["D", "A", "B", "C"]);
    }

    #[test]
    fn test_move_environment_to_end() {
        let mut settings = create_test_settings();
        assert_eq!(settings.move_environment(0, 1, 4), Ok(true));
        assert_eq!(names(&settings), vec!["A", "C", "D", "B"]);
    }

    #[test]
    fn test_move_environment_adjacent_gap_is_noop() {
        let mut settings = create_test_settings();
        assert_eq!(settings.move_environment(0, 1, 1), Ok(false));
        assert_eq!(settings.move_environment(0, 1, 2), Ok(false));
        assert_eq!(names(&settings), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_import_valid() {
        let json = r##"{
            "selectedProjectIndex": 0,
            "projects": [{"name": "P", "color": "#fff", "environments": [
                {"name": "Live", "domain": "example", "tld": "com", "color": "#00ff00"}
            ]}]
        }"##;

        let settings = Settings::from_import(json).unwrap();

        assert_eq!(settings.projects.len(), 1);
        assert_eq!(settings.projects[0].environments[0].host(), "example.com");
    }

    #[test]
    fn test_import_rejects_missing_projects() {
        let result = Settings::from_import(r#"{"selectedProjectIndex": 0}"#);
        assert!(matches!(result, Err(ImportError::MissingProjects)));

        let result = Settings::from_import(r#"{"projects": {"name": "P"}}"#);
        assert!(matches!(result, Err(ImportError::MissingProjects)));
    }

    #[test]
    fn test_rejected_import_keeps_current_settings() {
        let mut settings = create_test_settings();

        for json in [r#"{"selectedProjectIndex": 0}"#, "[1, 2]", "{not json"] {
            assert!(settings.replace_from_import(json).is_err());
            assert_eq!(settings, create_test_settings());
        }

        settings
            .replace_from_import(r#"{"projects": [{"name": "Other"}]}"#)
            .unwrap();
        assert_eq!(settings.projects.len(), 1);
        assert_eq!(settings.projects[0].name, "Other");
    }

    #[test]
    fn test_import_tolerates_malformed_entries() {
        let settings = Settings::from_import(r#"{"projects": [null]}"#).unwrap();
        assert!(settings.projects.is_empty());

        let settings = Settings::from_import(r#"{"projects": [{"name": 5}]}"#).unwrap();
        assert_eq!(settings.projects.len(), 1);
        assert_eq!(settings.projects[0].name, "");

        let settings = Settings::from_import(
            r#"{"projects": [{"name": "Shop", "color": 7, "environments": [
                {"name": "Live", "domain": "shop", "tld": "ch", "color": false},
                null,
                "junk"
            ]}]}"#,
        )
        .unwrap();
        let project = &settings.projects[0];
        assert_eq!(project.name, "Shop");
        assert_eq!(project.color, None);
        assert_eq!(project.environments.len(), 1);
        assert_eq!(project.environments[0].host(), "shop.ch");
        assert_eq!(project.environments[0].color, "");
    }

    #[test]
    fn test_import_rejects_non_objects() {
        assert!(matches!(Settings::from_import("[1, 2]"), Err(ImportError::NotAnObject)));
        assert!(matches!(Settings::from_import("42"), Err(ImportError::NotAnObject)));
        assert!(matches!(Settings::from_import("{not json"), Err(ImportError::InvalidJson(_))));
    }

    #[test]
    fn test_export_roundtrips_through_import() {
        let settings = create_test_settings();
        let json = settings.to_export_json().unwrap();
        assert_eq!(Settings::from_import(&json).unwrap(), settings);
    }

    #[test]
    fn test_open_request_parse() {
        assert_eq!(OpenRequest::parse(""), OpenRequest::Selected);
        assert_eq!(OpenRequest::parse("?project=2"), OpenRequest::Project(2));
        assert_eq!(OpenRequest::parse("project=abc"), OpenRequest::Selected);
        assert_eq!(
            OpenRequest::parse("project=new&domain=shop.example&tld=test&title=ddev"),
            OpenRequest::NewProject {
                domain: "shop.example".to_string(),
                tld: "test".to_string(),
                title: "ddev".to_string(),
            }
        );
        // Incomplete new-project requests show the selected project instead
        assert_eq!(OpenRequest::parse("project=new&domain=shop"), OpenRequest::Selected);
    }

    #[test]
    fn test_apply_open_request_new_project() {
        let mut settings = create_test_settings();
        let request = OpenRequest::NewProject {
            domain: "shop".to_string(),
            tld: "local".to_string(),
            title: "local".to_string(),
        };

        let (index, changed) = settings.apply_open_request(&request);

        assert_eq!(index, 1);
        assert!(changed);
        assert_eq!(settings.selected_project_index, 1);
        assert_eq!(settings.projects[1].name, "Project 2");
        assert_eq!(settings.projects[1].environments[0].host(), "shop.local");
    }

    #[test]
    fn test_apply_open_request_project() {
        let mut settings = create_test_settings();
        let (index, changed) = settings.apply_open_request(&OpenRequest::Project(0));
        assert_eq!(index, 0);
        assert!(!changed);
    }
}
