use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use smudge_core::RegistryConfig;

use crate::cli::*;
use crate::scenario::{Report, Runner, Scenario};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args, cli.format),
        Command::Check(args) => cmd_check(args, cli.format),
    }
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    if let Some(path) = &args.config {
        let config = load_config(path)?;
        smudge_core::configure(config)
            .with_context(|| format!("invalid registry config {}", path.display()))?;
    }
    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("loading {}", args.scenario.display()))?;
    let reports = Runner::new().run(&scenario)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            if reports.is_empty() {
                println!("No report steps.");
            }
            for report in &reports {
                println!("{}", render_report(report));
            }
        }
    }
    Ok(())
}

fn cmd_check(args: CheckArgs, format: OutputFormat) -> anyhow::Result<()> {
    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("loading {}", args.scenario.display()))?;
    scenario.validate()?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "valid": true,
                "classes": scenario.classes.len(),
                "steps": scenario.steps.len(),
            })
        ),
        OutputFormat::Text => println!(
            "{} {} classes, {} steps",
            "✓".green().bold(),
            scenario.classes.len(),
            scenario.steps.len()
        ),
    }
    Ok(())
}

/// Read registry settings from a TOML file.
pub fn load_config(path: &Path) -> anyhow::Result<RegistryConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: RegistryConfig =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// One line per report: step, binding and both field listings.
pub fn render_report(report: &Report) -> String {
    let state = if report.dirty {
        "dirty".red().bold()
    } else {
        "clean".green().bold()
    };
    format!(
        "[{}] {} {}  dirty: [{}]  smudged: [{}]",
        report.step,
        report.target.yellow(),
        state,
        report.dirty_fields.join(", "),
        report.smudged_fields.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_fields() {
        colored::control::set_override(false);
        let report = Report {
            step: 4,
            target: "t".into(),
            dirty: true,
            smudged: true,
            dirty_fields: vec!["title".into(), "tags".into()],
            smudged_fields: vec!["title".into()],
        };
        assert_eq!(
            render_report(&report),
            "[4] t dirty  dirty: [title, tags]  smudged: [title]"
        );
    }
}
