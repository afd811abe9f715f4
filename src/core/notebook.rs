//! Notebook parameterization (prepare only)
//!
//! Injects a `# Parameters` code cell the way papermill does and writes the
//! result next to the other prepared notebooks. Kernels are never started;
//! Jupyter runs the notebook when the user opens it.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::params::parse_parameters;
use crate::models::config::ServiceConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{ParamValue, Parameters};
use crate::providers::notebook_config::{read_local_notebook, NotebookConfigClient};
use crate::utils::constants::{DEFAULT_KERNEL_NAME, INJECTED_PARAMETERS_TAG, PARAMETERS_TAG};
use crate::utils::pyfmt::{float_literal, str_literal};

/// Python source for a parameter value
pub fn python_literal(value: &ParamValue) -> String {
    match value {
        ParamValue::Str(s) => str_literal(s),
        ParamValue::Floats(values) => {
            let items: Vec<String> = values.iter().map(|v| float_literal(*v)).collect();
            format!("[{}]", items.join(", "))
        }
        ParamValue::List(values) => {
            let items: Vec<String> = values.iter().map(|v| str_literal(v)).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

/// Source of the injected cell
pub fn parameters_source(parameters: &Parameters) -> String {
    let mut source = String::from("# Parameters\n");
    for (name, value) in parameters.iter() {
        source.push_str(&format!("{} = {}\n", name, python_literal(value)));
    }
    source
}

fn cell_has_tag(cell: &Value, tag: &str) -> bool {
    cell.pointer("/metadata/tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
        .unwrap_or(false)
}

/// Where and how a prepared notebook came from, recorded in its metadata
#[derive(Debug, Clone)]
pub struct Provenance<'a> {
    pub input_path: &'a str,
    pub output_path: &'a str,
    pub kernel_name: &'a str,
}

/// Inject `parameters` into `notebook` and stamp kernel + provenance metadata
pub fn parameterize(
    mut notebook: Value,
    parameters: &Parameters,
    provenance: &Provenance<'_>,
) -> AppResult<Value> {
    let needs_cell_id = notebook
        .get("nbformat_minor")
        .and_then(Value::as_u64)
        .map(|minor| minor >= 5)
        .unwrap_or(false);

    let cells = notebook
        .get_mut("cells")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| AppError::notebook_invalid("Notebook has no cells array"))?;

    cells.retain(|cell| !cell_has_tag(cell, INJECTED_PARAMETERS_TAG));

    let mut injected = json!({
        "cell_type": "code",
        "execution_count": null,
        "metadata": { "tags": [INJECTED_PARAMETERS_TAG] },
        "outputs": [],
        "source": parameters_source(parameters),
    });
    if needs_cell_id {
        injected["id"] = Value::String(Uuid::new_v4().to_string());
    }

    let position = cells
        .iter()
        .position(|cell| cell_has_tag(cell, PARAMETERS_TAG))
        .map(|idx| idx + 1)
        .unwrap_or(0);
    debug!("Injecting parameters cell at index {}", position);
    cells.insert(position, injected);

    let root = notebook
        .as_object_mut()
        .ok_or_else(|| AppError::notebook_invalid("Notebook is not a JSON object"))?;
    let metadata = root
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));
    if !metadata.is_object() {
        *metadata = Value::Object(Map::new());
    }

    match metadata.get_mut("kernelspec").and_then(Value::as_object_mut) {
        Some(spec) => {
            spec.insert("name".into(), Value::String(provenance.kernel_name.to_string()));
        }
        None => {
            metadata["kernelspec"] = json!({
                "name": provenance.kernel_name,
                "display_name": provenance.kernel_name,
                "language": "python",
            });
        }
    }

    metadata["papermill"] = json!({
        "parameters": parameters.to_json(),
        "input_path": provenance.input_path,
        "output_path": provenance.output_path,
        "start_time": Utc::now().to_rfc3339(),
        "prepare_only": true,
    });

    Ok(notebook)
}

// ============================================
// Kernel discovery
// ============================================

/// Kernelspec search path, most specific first
pub fn kernel_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(paths) = std::env::var("JUPYTER_PATH") {
        dirs.extend(
            paths
                .split(':')
                .filter(|p| !p.is_empty())
                .map(|p| Path::new(p).join("kernels")),
        );
    }
    if let Ok(data_dir) = std::env::var("JUPYTER_DATA_DIR") {
        dirs.push(Path::new(&data_dir).join("kernels"));
    }
    if let Ok(home) = std::env::var("HOME") {
        dirs.push(Path::new(&home).join(".local/share/jupyter/kernels"));
    }
    dirs.push(PathBuf::from("/usr/local/share/jupyter/kernels"));
    dirs.push(PathBuf::from("/usr/share/jupyter/kernels"));
    dirs
}

/// Names of installed kernels (directories holding a `kernel.json`)
pub fn discover_kernels(dirs: &[PathBuf]) -> Vec<String> {
    let mut names = Vec::new();
    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            if entry.path().join("kernel.json").is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
    }
    names.sort();
    names.dedup();
    names
}

/// `python3`, then `python`, then the first installed kernel
pub fn choose_kernel(available: &[String]) -> String {
    for preferred in ["python3", "python"] {
        if available.iter().any(|k| k == preferred) {
            return preferred.to_string();
        }
    }
    available
        .first()
        .cloned()
        .unwrap_or_else(|| DEFAULT_KERNEL_NAME.to_string())
}

pub fn default_kernel_name() -> String {
    choose_kernel(&discover_kernels(&kernel_dirs()))
}

// ============================================
// Runner
// ============================================

/// Accept only a bare file name such as `ndvi_calculation.ipynb`
pub fn validate_file_name(name: &str) -> AppResult<&str> {
    let bare = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
    if !bare || name.starts_with('.') {
        return Err(AppError::new(
            ErrorCode::InvalidParameter,
            format!("Invalid notebook name: {}", name),
        ));
    }
    Ok(name)
}

/// Prepares notebooks and builds the Jupyter URLs that open them
pub struct NotebookRunner {
    output_dir: PathBuf,
    template_dir: PathBuf,
    jupyter_base_url: String,
    kernel_name: String,
}

impl NotebookRunner {
    /// Installed kernels are scanned once, here
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_kernel(config, default_kernel_name())
    }

    pub fn with_kernel(config: &ServiceConfig, kernel_name: impl Into<String>) -> Self {
        Self {
            output_dir: config.notebook_output_dir.clone(),
            template_dir: config.notebook_template_dir.clone(),
            jupyter_base_url: config.jupyter_base_url.clone(),
            kernel_name: kernel_name.into(),
        }
    }

    pub fn kernel_name(&self) -> &str {
        &self.kernel_name
    }

    /// Prepare the configured notebook `notebook_id` with the query parameters.
    /// Returns the output id used in the view URL.
    pub async fn execute(
        &self,
        configs: &NotebookConfigClient,
        notebook_id: &str,
        query: &HashMap<String, String>,
    ) -> AppResult<String> {
        let start = Instant::now();
        let output_id = Uuid::new_v4().to_string();

        let entry = configs.get_notebook_config(notebook_id).await?;
        let parameters = parse_parameters(query, &entry.input_types());
        let notebook = configs.fetch_notebook(&entry).await?;

        let input_path = entry.file.clone().unwrap_or_default();
        let output_name = format!("{}-{}.ipynb", notebook_id, output_id);
        self.write_prepared(notebook, &input_path, &parameters, &output_name)
            .await?;

        info!(
            "📓 Prepared notebook {} with {} parameter(s) in {}ms",
            output_name,
            parameters.len(),
            start.elapsed().as_millis()
        );
        Ok(output_id)
    }

    /// First-generation endpoint: local template, fixed `cog_url`/`bbox` inputs
    pub async fn execute_legacy(
        &self,
        notebook: &str,
        query: &HashMap<String, String>,
    ) -> AppResult<String> {
        let notebook = validate_file_name(notebook)?;
        let output_id = Uuid::new_v4().to_string();

        let spec = vec![
            ("cog_url".to_string(), "string".to_string()),
            ("bbox".to_string(), "bbox".to_string()),
        ];
        let parameters = parse_parameters(query, &spec);

        let input_path = self.template_dir.join(notebook);
        if !tokio::fs::try_exists(&input_path).await.unwrap_or(false) {
            return Err(AppError::new(
                ErrorCode::NotebookNotFound,
                format!("Notebook template '{}' not found", notebook),
            ));
        }
        let document = read_local_notebook(&input_path).await?;
        let output_name = format!("output-{}.ipynb", output_id);
        self.write_prepared(
            document,
            &input_path.display().to_string(),
            &parameters,
            &output_name,
        )
        .await?;

        info!("📓 Prepared legacy notebook {}", output_name);
        Ok(output_id)
    }

    async fn write_prepared(
        &self,
        notebook: Value,
        input_path: &str,
        parameters: &Parameters,
        output_name: &str,
    ) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output_path = self.output_dir.join(output_name);
        let output_display = output_path.display().to_string();

        let prepared = parameterize(
            notebook,
            parameters,
            &Provenance {
                input_path,
                output_path: &output_display,
                kernel_name: &self.kernel_name,
            },
        )?;

        let body = serde_json::to_string_pretty(&prepared)?;
        tokio::fs::write(&output_path, body).await?;
        Ok(output_path)
    }

    /// Jupyter Lab URL of a notebook prepared by `execute`
    pub fn view_notebook_url(&self, notebook_id: &str, output_id: &str) -> String {
        format!(
            "{}/lab/tree/{}-{}.ipynb",
            self.jupyter_base_url, notebook_id, output_id
        )
    }

    /// Jupyter Lab URL of a notebook prepared by `execute_legacy`
    pub fn legacy_view_url(&self, output_id: &str) -> String {
        format!(
            "{}/lab/tree/notebooks/output-{}.ipynb",
            self.jupyter_base_url, output_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notebook() -> Value {
        json!({
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {"kernelspec": {"name": "old", "display_name": "Old"}},
            "cells": [
                {"cell_type": "markdown", "metadata": {}, "source": "# NDVI"},
                {"cell_type": "code", "metadata": {"tags": ["parameters"]}, "source": "cog_url = None"},
                {"cell_type": "code", "metadata": {"tags": ["injected-parameters"]}, "source": "stale"},
                {"cell_type": "code", "metadata": {}, "source": "print(cog_url)"}
            ]
        })
    }

    fn provenance() -> Provenance<'static> {
        Provenance {
            input_path: "in.ipynb",
            output_path: "out.ipynb",
            kernel_name: "python3",
        }
    }

    fn params() -> Parameters {
        let mut p = Parameters::new();
        p.insert("cog_url", ParamValue::Str("https://x/a.tif".into()));
        p.insert("bbox", ParamValue::Floats(vec![-3.0, 52.5, -2.0, 53.0]));
        p
    }

    #[test]
    fn test_python_literals() {
        assert_eq!(python_literal(&ParamValue::Str("a\"b".into())), "\"a\\\"b\"");
        assert_eq!(
            python_literal(&ParamValue::Floats(vec![1.0, -2.5])),
            "[1.0, -2.5]"
        );
        assert_eq!(
            python_literal(&ParamValue::List(vec!["a".into(), "b".into()])),
            "[\"a\", \"b\"]"
        );
    }

    #[test]
    fn test_parameters_source() {
        assert_eq!(
            parameters_source(&params()),
            "# Parameters\ncog_url = \"https://x/a.tif\"\nbbox = [-3.0, 52.5, -2.0, 53.0]\n"
        );
    }

    #[test]
    fn test_injected_after_parameters_cell() {
        let out = parameterize(notebook(), &params(), &provenance()).unwrap();
        let cells = out["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 4, "stale injected cell replaced");
        assert!(cell_has_tag(&cells[1], PARAMETERS_TAG));
        assert!(cell_has_tag(&cells[2], INJECTED_PARAMETERS_TAG));
        assert!(cells[2]["source"].as_str().unwrap().starts_with("# Parameters\n"));
        assert!(cells[2]["id"].is_string());
        assert_eq!(out["metadata"]["kernelspec"]["name"], "python3");
        assert_eq!(out["metadata"]["kernelspec"]["display_name"], "Old");
        assert_eq!(out["metadata"]["papermill"]["parameters"]["cog_url"], "https://x/a.tif");
        assert_eq!(out["metadata"]["papermill"]["prepare_only"], true);
    }

    #[test]
    fn test_injected_at_top_without_parameters_cell() {
        let nb = json!({
            "nbformat": 4,
            "nbformat_minor": 4,
            "cells": [{"cell_type": "code", "metadata": {}, "source": "x = 1"}]
        });
        let out = parameterize(nb, &params(), &provenance()).unwrap();
        let cells = out["cells"].as_array().unwrap();
        assert!(cell_has_tag(&cells[0], INJECTED_PARAMETERS_TAG));
        assert!(cells[0].get("id").is_none());
        assert_eq!(out["metadata"]["kernelspec"]["language"], "python");
    }

    #[test]
    fn test_rejects_non_notebook() {
        let err = parameterize(json!({"foo": 1}), &params(), &provenance()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotebookInvalid);
    }

    #[test]
    fn test_choose_kernel() {
        assert_eq!(choose_kernel(&[]), "python3");
        assert_eq!(choose_kernel(&["ir".into(), "python".into()]), "python");
        assert_eq!(choose_kernel(&["ir".into(), "python3".into()]), "python3");
        assert_eq!(choose_kernel(&["ir".into(), "julia".into()]), "ir");
    }

    #[test]
    fn test_discover_kernels() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["python3", "ir"] {
            let kdir = dir.path().join(name);
            std::fs::create_dir_all(&kdir).unwrap();
            std::fs::write(kdir.join("kernel.json"), "{}").unwrap();
        }
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let found = discover_kernels(&[dir.path().to_path_buf(), PathBuf::from("/nonexistent")]);
        assert_eq!(found, vec!["ir".to_string(), "python3".to_string()]);
    }

    #[tokio::test]
    async fn test_runner_stamps_its_kernel() {
        let output = tempfile::tempdir().unwrap();
        let templates = tempfile::tempdir().unwrap();
        std::fs::write(
            templates.path().join("ndvi.ipynb"),
            notebook().to_string(),
        )
        .unwrap();
        let dirs: HashMap<&str, String> = [
            ("NOTEBOOK_OUTPUT_DIR", output.path().display().to_string()),
            ("NOTEBOOK_TEMPLATE_DIR", templates.path().display().to_string()),
        ]
        .into_iter()
        .collect();
        let config = ServiceConfig::from_lookup(|key| dirs.get(key).cloned());

        let runner = NotebookRunner::with_kernel(&config, "ir");
        assert_eq!(runner.kernel_name(), "ir");

        let mut query = HashMap::new();
        query.insert("cog_url".to_string(), "u".to_string());
        let output_id = runner.execute_legacy("ndvi.ipynb", &query).await.unwrap();

        let written = output.path().join(format!("output-{}.ipynb", output_id));
        let prepared: Value =
            serde_json::from_str(&std::fs::read_to_string(written).unwrap()).unwrap();
        assert_eq!(prepared["metadata"]["kernelspec"]["name"], "ir");
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("ndvi_calculation.ipynb").is_ok());
        assert!(validate_file_name("../secret.ipynb").is_err());
        assert!(validate_file_name("a/b.ipynb").is_err());
        assert!(validate_file_name(".hidden").is_err());
    }
}
