//! Project loading and entrypoint resolution

use crate::constants::AGENT_CONFIG_FILE_NAMES;
use crate::server::callables::{AgentCallable, CallableRegistry, ModuleSymbol};
use crate::types::{EntrypointSpec, ErrorCode, ProjectConfig, RunAgentError, RunAgentResult};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// An entrypoint spec bound to its loaded callable.
///
/// Callables are resolved once at project-load time and cached for the
/// server's lifetime.
#[derive(Debug, Clone)]
pub struct ResolvedEntrypoint {
    pub spec: EntrypointSpec,
    pub callable: AgentCallable,
}

impl ResolvedEntrypoint {
    /// Dispatch kind comes from the tag suffix, not the callable shape
    pub fn is_streaming(&self) -> bool {
        self.spec.is_streaming()
    }
}

/// Loads a project directory into a validated, ready-to-dispatch entrypoint set
pub struct ProjectLoader;

impl ProjectLoader {
    /// Load a project: read its config, resolve every entrypoint against the
    /// callable registry, and enforce tag uniqueness.
    pub fn load(
        project_path: &Path,
        registry: &CallableRegistry,
    ) -> RunAgentResult<(ProjectConfig, Vec<ResolvedEntrypoint>)> {
        let config = Self::read_config(project_path)?;

        let mut seen = HashSet::new();
        for spec in &config.entrypoints {
            if !seen.insert(spec.tag.clone()) {
                return Err(RunAgentError::execution(
                    ErrorCode::DuplicateTag,
                    format!("Entrypoint tag '{}' is declared more than once", spec.tag),
                    Some("Give every entrypoint a unique tag".to_string()),
                    None,
                ));
            }
        }

        let mut resolved = Vec::with_capacity(config.entrypoints.len());
        for spec in &config.entrypoints {
            resolved.push(Self::resolve_entrypoint(project_path, registry, spec)?);
        }

        tracing::info!(
            "Loaded project '{}' with {} entrypoint(s) from {}",
            config.agent_name,
            resolved.len(),
            project_path.display()
        );

        Ok((config, resolved))
    }

    /// Read the declarative config from the project root, probing
    /// `runagent.config.json`, then the YAML flavors.
    pub fn read_config(project_path: &Path) -> RunAgentResult<ProjectConfig> {
        for name in AGENT_CONFIG_FILE_NAMES {
            let candidate = project_path.join(name);
            if !candidate.exists() {
                continue;
            }

            let content = fs::read_to_string(&candidate).map_err(|e| {
                RunAgentError::execution(
                    ErrorCode::ConfigInvalid,
                    format!("Failed to read {}: {}", candidate.display(), e),
                    None,
                    None,
                )
            })?;

            let config: ProjectConfig = if name.ends_with(".json") {
                serde_json::from_str(&content).map_err(|e| Self::invalid_config(name, e))?
            } else {
                serde_yaml::from_str(&content).map_err(|e| Self::invalid_config(name, e))?
            };

            return Ok(config);
        }

        Err(RunAgentError::execution(
            ErrorCode::ConfigMissing,
            format!(
                "No runagent.config.* file found in {}",
                project_path.display()
            ),
            Some("Create a runagent.config.json at the project root".to_string()),
            None,
        ))
    }

    fn invalid_config<E: std::fmt::Display>(name: &str, err: E) -> RunAgentError {
        RunAgentError::execution(
            ErrorCode::ConfigInvalid,
            format!("Malformed {}: {}", name, err),
            Some("Check the config against the runagent.config schema".to_string()),
            None,
        )
    }

    fn resolve_entrypoint(
        project_path: &Path,
        registry: &CallableRegistry,
        spec: &EntrypointSpec,
    ) -> RunAgentResult<ResolvedEntrypoint> {
        let file_path = project_path.join(&spec.file);
        if !file_path.exists() {
            return Err(RunAgentError::execution(
                ErrorCode::EntrypointUnresolved,
                format!(
                    "Entrypoint file '{}' for tag '{}' not found in project",
                    spec.file, spec.tag
                ),
                Some("Check the 'file' path in the entrypoint declaration".to_string()),
                None,
            ));
        }

        let symbol = registry.resolve(&spec.file, &spec.module).ok_or_else(|| {
            RunAgentError::execution(
                ErrorCode::EntrypointUnresolved,
                format!(
                    "Callable '{}' not found in '{}' for tag '{}'",
                    spec.module, spec.file, spec.tag
                ),
                Some(format!(
                    "Register a callable under ('{}', '{}') before serving",
                    spec.file, spec.module
                )),
                None,
            )
        })?;

        let callable = match symbol {
            ModuleSymbol::Callable(callable) => callable.clone(),
            ModuleSymbol::Value(_) => {
                return Err(RunAgentError::execution(
                    ErrorCode::EntrypointNotCallable,
                    format!(
                        "Symbol '{}' in '{}' is not invocable",
                        spec.module, spec.file
                    ),
                    Some("Point the entrypoint at a function, not a value".to_string()),
                    None,
                ));
            }
        };

        // Nominal check only. The suffix rule stays authoritative for
        // dispatch; a mismatch surfaces behaviorally at invocation time.
        if !Self::validate_tag(spec, &callable) {
            tracing::warn!(
                "Tag '{}' and callable shape disagree ({} vs {})",
                spec.tag,
                if spec.is_streaming() { "streaming tag" } else { "unary tag" },
                if callable.is_streaming() { "streaming callable" } else { "unary callable" },
            );
        }

        Ok(ResolvedEntrypoint {
            spec: spec.clone(),
            callable,
        })
    }

    /// Pure check: does the tag's suffix agree with the callable's shape?
    pub fn validate_tag(spec: &EntrypointSpec, callable: &AgentCallable) -> bool {
        spec.is_streaming() == callable.is_streaming()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_project(config: &serde_json::Value) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("runagent.config.json"),
            config.to_string(),
        )
        .unwrap();
        fs::write(temp_dir.path().join("main.py"), "def run(q): ...").unwrap();
        temp_dir
    }

    fn base_config() -> serde_json::Value {
        json!({
            "agent_name": "math-agent",
            "framework": "langgraph",
            "version": "1.0.0",
            "entrypoints": [
                {"tag": "solve", "file": "main.py", "module": "run"},
                {"tag": "gen_stream", "file": "main.py", "module": "run_stream"}
            ]
        })
    }

    fn base_registry() -> CallableRegistry {
        let mut registry = CallableRegistry::new();
        registry.register_fn("main.py", "run", |_args, _kwargs| async { Ok(json!("ok")) });
        registry.register_stream_fn("main.py", "run_stream", |_args, _kwargs| {
            futures::stream::iter(vec![Ok(json!("a"))])
        });
        registry
    }

    #[test]
    fn test_load_happy_path() {
        let project = write_project(&base_config());
        let registry = base_registry();

        let (config, resolved) = ProjectLoader::load(project.path(), &registry).unwrap();
        assert_eq!(config.agent_name, "math-agent");
        assert_eq!(resolved.len(), 2);
        assert!(!resolved[0].is_streaming());
        assert!(resolved[1].is_streaming());
    }

    #[test]
    fn test_config_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = ProjectLoader::load(temp_dir.path(), &base_registry()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigMissing);
    }

    #[test]
    fn test_config_invalid() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("runagent.config.json"),
            "{not valid json",
        )
        .unwrap();

        let err = ProjectLoader::load(temp_dir.path(), &base_registry()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_yaml_config() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("runagent.config.yaml"),
            r#"
agent_name: math-agent
framework: langgraph
version: "1.0.0"
entrypoints:
  - tag: solve
    file: main.py
    module: run
"#,
        )
        .unwrap();
        fs::write(temp_dir.path().join("main.py"), "def run(q): ...").unwrap();

        let (config, resolved) =
            ProjectLoader::load(temp_dir.path(), &base_registry()).unwrap();
        assert_eq!(config.framework, "langgraph");
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_duplicate_tag() {
        let mut config = base_config();
        config["entrypoints"]
            .as_array_mut()
            .unwrap()
            .push(json!({"tag": "solve", "file": "main.py", "module": "run"}));
        let project = write_project(&config);

        let err = ProjectLoader::load(project.path(), &base_registry()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateTag);
    }

    #[test]
    fn test_entrypoint_file_missing() {
        let config = json!({
            "agent_name": "math-agent",
            "framework": "langgraph",
            "version": "1.0.0",
            "entrypoints": [{"tag": "solve", "file": "missing.py", "module": "run"}]
        });
        let project = write_project(&config);

        let err = ProjectLoader::load(project.path(), &base_registry()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EntrypointUnresolved);
    }

    #[test]
    fn test_entrypoint_unregistered() {
        let config = json!({
            "agent_name": "math-agent",
            "framework": "langgraph",
            "version": "1.0.0",
            "entrypoints": [{"tag": "solve", "file": "main.py", "module": "unknown_fn"}]
        });
        let project = write_project(&config);

        let err = ProjectLoader::load(project.path(), &base_registry()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EntrypointUnresolved);
    }

    #[test]
    fn test_entrypoint_not_callable() {
        let config = json!({
            "agent_name": "math-agent",
            "framework": "langgraph",
            "version": "1.0.0",
            "entrypoints": [{"tag": "solve", "file": "main.py", "module": "MODEL_NAME"}]
        });
        let project = write_project(&config);

        let mut registry = base_registry();
        registry.register_value("main.py", "MODEL_NAME", json!("gpt-4o"));

        let err = ProjectLoader::load(project.path(), &registry).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EntrypointNotCallable);
    }

    #[test]
    fn test_nominal_mismatch_still_loads() {
        // A streaming tag bound to a unary callable loads; enforcement is
        // behavioral at dispatch.
        let config = json!({
            "agent_name": "math-agent",
            "framework": "langgraph",
            "version": "1.0.0",
            "entrypoints": [{"tag": "solve_stream", "file": "main.py", "module": "run"}]
        });
        let project = write_project(&config);

        let (_, resolved) = ProjectLoader::load(project.path(), &base_registry()).unwrap();
        assert!(resolved[0].is_streaming());
        assert!(!resolved[0].callable.is_streaming());
        assert!(!ProjectLoader::validate_tag(
            &resolved[0].spec,
            &resolved[0].callable
        ));
    }
}
