//! `template=` output rendered with minijinja

use minijinja::{Environment, UndefinedBehavior, Value as TemplateValue};
use std::io::Write;

use konjure_core::Node;

use crate::error::{CliError, Result};

const TEMPLATE_NAME: &str = "output";

/// Render the template once per node, the node being the context
pub fn write_template(nodes: &[Node], text: &str, out: &mut impl Write) -> Result<()> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env.add_template(TEMPLATE_NAME, text)
        .map_err(|e| CliError::usage(format!("invalid output template: {}", e)))?;
    let template = env
        .get_template(TEMPLATE_NAME)
        .map_err(|e| CliError::output(e.to_string()))?;

    for node in nodes {
        let rendered = template
            .render(TemplateValue::from_serialize(node.value()))
            .map_err(|e| {
                CliError::output(format!("failed to render {}: {}", node.display_name(), e))
            })?;
        out.write_all(rendered.as_bytes())?;
    }
    Ok(())
}
