//! Helm values command
//!
//! Merges values files and `--set` style overrides in exactly the order they
//! appear on the command line, then prints the resulting document.

use clap::{ArgMatches, Args};
use serde_yaml::Value;

use konjure_core::values::split_set_expression;
use konjure_core::{HelmValue, ValuesMerger};

use crate::error::Result;

#[derive(Args, Debug)]
pub struct HelmValuesArgs {
    /// Values file(s) to merge (glob patterns allowed)
    #[arg(short = 'f', long = "values", value_name = "FILE")]
    pub values: Vec<String>,

    /// Set values on the command line (key=value)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Set string values on the command line (key=value)
    #[arg(long = "set-string", value_name = "KEY=VALUE")]
    pub set_string: Vec<String>,

    /// Set values from files (key=path)
    #[arg(long = "set-file", value_name = "KEY=PATH")]
    pub set_file: Vec<String>,
}

/// Pair every value of an argument with its command line position
fn positioned<'a>(matches: &ArgMatches, id: &str, values: &'a [String]) -> Vec<(usize, &'a str)> {
    matches
        .indices_of(id)
        .map(|indices| indices.zip(values.iter().map(String::as_str)).collect())
        .unwrap_or_default()
}

/// The value directives in command line order
pub fn directives(args: &HelmValuesArgs, matches: &ArgMatches) -> Result<Vec<HelmValue>> {
    let mut ordered: Vec<(usize, HelmValue)> = Vec::new();

    for (index, path) in positioned(matches, "values", &args.values) {
        ordered.push((index, HelmValue::File(path.to_string())));
    }
    for (index, expr) in positioned(matches, "set", &args.set) {
        for (name, value) in split_set_expression(expr)? {
            ordered.push((
                index,
                HelmValue::Set {
                    name,
                    value: Value::String(value),
                },
            ));
        }
    }
    for (index, expr) in positioned(matches, "set_string", &args.set_string) {
        for (name, value) in split_set_expression(expr)? {
            ordered.push((index, HelmValue::SetString { name, value }));
        }
    }
    for (index, expr) in positioned(matches, "set_file", &args.set_file) {
        for (name, path) in split_set_expression(expr)? {
            ordered.push((index, HelmValue::SetFile { name, path }));
        }
    }

    // Stable: pairs split from one expression keep their order
    ordered.sort_by_key(|(index, _)| *index);
    Ok(ordered.into_iter().map(|(_, directive)| directive).collect())
}

pub fn run(args: &HelmValuesArgs, matches: &ArgMatches) -> Result<()> {
    let directives = directives(args, matches)?;
    tracing::debug!(count = directives.len(), "merging helm values");

    let merger = ValuesMerger::new(std::env::current_dir()?);
    let values = merger.merge(&directives)?;
    print!("{}", values.to_yaml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Command, FromArgMatches};

    fn parse(argv: &[&str]) -> (HelmValuesArgs, ArgMatches) {
        let command = HelmValuesArgs::augment_args(Command::new("helm-values"));
        let matches = command
            .try_get_matches_from(std::iter::once("helm-values").chain(argv.iter().copied()))
            .unwrap();
        (HelmValuesArgs::from_arg_matches(&matches).unwrap(), matches)
    }

    #[test]
    fn test_directives_keep_command_line_order() {
        let (args, matches) = parse(&[
            "--set",
            "a=1,b=2",
            "-f",
            "values.yaml",
            "--set-string",
            "c=3",
            "--set",
            "a=4",
            "--set-file",
            "d=notes.txt",
        ]);
        let directives = directives(&args, &matches).unwrap();
        assert_eq!(
            directives,
            vec![
                HelmValue::Set {
                    name: "a".into(),
                    value: Value::String("1".into())
                },
                HelmValue::Set {
                    name: "b".into(),
                    value: Value::String("2".into())
                },
                HelmValue::File("values.yaml".into()),
                HelmValue::SetString {
                    name: "c".into(),
                    value: "3".into()
                },
                HelmValue::Set {
                    name: "a".into(),
                    value: Value::String("4".into())
                },
                HelmValue::SetFile {
                    name: "d".into(),
                    path: "notes.txt".into()
                },
            ]
        );
    }

    #[test]
    fn test_malformed_set_expression() {
        let (args, matches) = parse(&["--set", "novalue"]);
        assert!(directives(&args, &matches).is_err());
    }
}
