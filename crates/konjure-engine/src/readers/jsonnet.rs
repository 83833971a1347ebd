use serde_json::Value as JsonValue;
use std::path::PathBuf;

use konjure_core::Node;
use konjure_core::spec::JsonnetSpec;

use super::Reader;
use crate::error::{EngineError, Result};
use crate::exec::ExternalCommand;
use crate::options::ReaderOptions;

const BUNDLER_FILE: &str = "jsonnetfile.json";
const VENDOR_DIR: &str = "vendor";

/// Evaluates a Jsonnet program
pub struct JsonnetReader<'a> {
    spec: JsonnetSpec,
    options: &'a ReaderOptions,
}

impl<'a> JsonnetReader<'a> {
    pub fn new(spec: JsonnetSpec, options: &'a ReaderOptions) -> Self {
        Self { spec, options }
    }

    /// Directory that may hold a `jsonnetfile.json`
    fn package_home(&self) -> PathBuf {
        if !self.spec.jsonnet_bundler_package_home.is_empty() {
            return self.options.resolve(&self.spec.jsonnet_bundler_package_home);
        }
        if !self.spec.filename.is_empty() {
            if let Some(parent) = self.options.resolve(&self.spec.filename).parent() {
                return parent.to_path_buf();
            }
        }
        self.options.working_dir.clone()
    }

    fn uses_bundler(&self) -> bool {
        self.package_home().join(BUNDLER_FILE).is_file()
    }

    /// `jb install` when the vendor tree is missing, `jb update` on request
    pub fn bundler_command(&self) -> Option<ExternalCommand> {
        if !self.uses_bundler() {
            return None;
        }
        let home = self.package_home();
        let action = if self.spec.jsonnet_bundler_refresh {
            "update"
        } else if !home.join(VENDOR_DIR).is_dir() {
            "install"
        } else {
            return None;
        };
        Some(
            ExternalCommand::new("jb", &self.options.tools.jb)
                .current_dir(&home)
                .arg(action),
        )
    }

    /// The `jsonnet` invocation
    pub fn command(&self) -> Result<ExternalCommand> {
        let mut command = ExternalCommand::new("jsonnet", &self.options.tools.jsonnet)
            .current_dir(&self.options.working_dir);

        let mut library_paths = Vec::new();
        if self.uses_bundler() {
            library_paths.push(self.package_home().join(VENDOR_DIR));
        }
        library_paths.extend(self.spec.library_paths.iter().map(|p| self.options.resolve(p)));
        for path in library_paths {
            command = command.arg("--jpath").arg(path);
        }

        for parameter in &self.spec.external_variables {
            command = command.args(parameter.args("ext"));
        }
        for parameter in &self.spec.top_level_arguments {
            command = command.args(parameter.args("tla"));
        }

        if !self.spec.filename.is_empty() {
            command = command.arg(self.options.resolve(&self.spec.filename));
        } else if !self.spec.code.is_empty() {
            command = command.arg("--exec").arg(&self.spec.code);
        } else {
            return Err(EngineError::MalformedSpec {
                spec: "Jsonnet".to_string(),
                message: "either filename or code is required".to_string(),
            });
        }

        Ok(command)
    }
}

impl Reader for JsonnetReader<'_> {
    fn read(&mut self) -> Result<Vec<Node>> {
        if let Some(bundler) = self.bundler_command() {
            bundler.output()?;
        }
        let output = self.command()?.output_string()?;
        parse_jsonnet_output(&output)
    }
}

/// Interpret evaluated Jsonnet as resource nodes
///
/// - an array yields each (object) element
/// - an object with a `kind` is a single resource
/// - any other object maps file names to resources, emitted in key order
///   with a `Source: <file>` head comment
pub fn parse_jsonnet_output(output: &str) -> Result<Vec<Node>> {
    let invalid = |message: String| EngineError::InvalidJsonnetOutput { message };

    let trimmed = output.trim_start();
    match trimmed.chars().next() {
        Some('[') => {
            let items: Vec<JsonValue> =
                serde_json::from_str(trimmed).map_err(|e| invalid(e.to_string()))?;
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    if item.is_object() {
                        to_node(&item)
                    } else {
                        Err(invalid(format!("list item {} is not an object", i)))
                    }
                })
                .collect()
        }
        Some('{') => {
            let value: serde_json::Map<String, JsonValue> =
                serde_json::from_str(trimmed).map_err(|e| invalid(e.to_string()))?;
            if value.contains_key("kind") {
                return Ok(vec![to_node(&JsonValue::Object(value))?]);
            }

            let mut files: Vec<(String, JsonValue)> = value.into_iter().collect();
            files.sort_by(|a, b| a.0.cmp(&b.0));
            files
                .into_iter()
                .map(|(filename, resource)| {
                    if !resource.is_object() {
                        return Err(invalid(format!("'{}' is not an object", filename)));
                    }
                    let mut node = to_node(&resource)?;
                    node.set_head_comment(format!("Source: {}", filename));
                    Ok(node)
                })
                .collect()
        }
        _ => Err(invalid(
            "expected a JSON object or array of objects".to_string(),
        )),
    }
}

fn to_node(value: &JsonValue) -> Result<Node> {
    Ok(Node::new(serde_yaml::to_value(value)?))
}
