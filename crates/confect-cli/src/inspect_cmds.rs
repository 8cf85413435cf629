use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use confect::{Conf, Depot, EnvOverride};
use tracing::debug;

use crate::cli::OutputFormat;

pub(crate) fn handle_check(file: &Path, format: OutputFormat) -> Result<()> {
    let conf = Conf::new();
    conf.load_file(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    print_staged(&conf.staged(), format)
}

pub(crate) fn handle_module(name: &str, paths: Vec<PathBuf>, format: OutputFormat) -> Result<()> {
    let mut conf = Conf::new();
    for path in paths {
        debug!(path = %path.display(), "adding module search path");
        conf.add_module_path(path);
    }
    conf.load_module(name)
        .with_context(|| format!("failed to load module '{name}'"))?;
    print_staged(&conf.staged(), format)
}

pub(crate) fn handle_env(prefix: &str, format: OutputFormat) -> Result<()> {
    let overrides = confect::env_overrides(prefix, std::env::vars_os())?;
    match format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = overrides.iter().map(env_json).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            if overrides.is_empty() {
                eprintln!("No variables named {prefix}__GROUP__PROPERTY found.");
            }
            for entry in &overrides {
                println!(
                    "{}.{} = {:?}  ({})",
                    entry.group, entry.property, entry.raw, entry.var
                );
            }
        }
    }
    Ok(())
}

fn print_staged(depot: &Depot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&staged_json(depot)?)?);
        }
        OutputFormat::Text => print!("{}", render_text(depot)),
    }
    Ok(())
}

fn env_json(entry: &EnvOverride) -> serde_json::Value {
    serde_json::json!({
        "var": entry.var,
        "group": entry.group,
        "property": entry.property,
        "value": entry.raw,
    })
}

fn staged_json(depot: &Depot) -> Result<serde_json::Value> {
    let mut groups = serde_json::Map::new();
    for group in depot.groups() {
        let mut properties = serde_json::Map::new();
        for (name, value) in group.items() {
            properties.insert(name.to_string(), serde_json::to_value(value)?);
        }
        groups.insert(group.name().to_string(), serde_json::Value::Object(properties));
    }
    Ok(serde_json::Value::Object(groups))
}

/// One `[group]` section per staged group, each value annotated with its kind.
fn render_text(depot: &Depot) -> String {
    let mut out = String::new();
    for group in depot.groups() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("[{}]\n", group.name()));
        for (name, value) in group.items() {
            out.push_str(&format!("{name} = {value}  # {}\n", value.kind_name()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_depot() -> Depot {
        let mut depot = Depot::new();
        depot.group("dummy").set("opt1", 5).set("opt2", "other");
        depot.group("net").set("hosts", confect::Value::list(["a", "b"]));
        depot
    }

    #[test]
    fn test_render_text_sections() {
        assert_eq!(
            render_text(&sample_depot()),
            "[dummy]\nopt1 = 5  # int\nopt2 = other  # str\n\n[net]\nhosts = [\"a\",\"b\"]  # list\n"
        );
    }

    #[test]
    fn test_render_text_empty() {
        assert_eq!(render_text(&Depot::new()), "");
    }

    #[test]
    fn test_staged_json_shape() {
        let json = staged_json(&sample_depot()).unwrap();
        assert_eq!(json["dummy"]["opt1"], 5);
        assert_eq!(json["dummy"]["opt2"], "other");
        assert_eq!(json["net"]["hosts"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_env_json_fields() {
        let entry = EnvOverride {
            var: "APP__g__p".to_string(),
            group: "g".to_string(),
            property: "p".to_string(),
            raw: "42".to_string(),
        };
        let json = env_json(&entry);
        assert_eq!(json["group"], "g");
        assert_eq!(json["value"], "42");
    }
}
