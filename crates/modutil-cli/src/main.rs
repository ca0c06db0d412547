use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use modutil_core::{init_tracing, ModutilConfig, ShadeRemapper, ShadeTask, TaskOutcome};
use tracing::debug;

fn main() -> Result<()> {
    init_tracing();
    let matches = command().get_matches();
    run(&matches)
}

fn command() -> Command {
    Command::new("modutil")
        .version(modutil_core::VERSION)
        .about("Constant injection and jar shading for module builds")
        .subcommand_required(true)
        .subcommand(
            Command::new("inject")
                .about("Copy source trees, injecting constants into sources and resources")
                .arg(config_arg().required(true))
                .arg(
                    Arg::new("ignore-cache")
                        .long("ignore-cache")
                        .help("Run even when no cached constant changed, and do not write the cache")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("shade")
                .about("Rename packages inside a jar")
                .arg(config_arg().required_unless_present_all(["input", "output"]))
                .arg(
                    Arg::new("input")
                        .long("input")
                        .value_name("JAR")
                        .help("Jar to read")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("config"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_name("JAR")
                        .help("Jar to write")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("config"),
                )
                .arg(
                    Arg::new("rename")
                        .long("rename")
                        .value_name("FROM=TO")
                        .help("Package rename, e.g. com.google.gson=my.mod.gson (repeatable, first match wins)")
                        .action(ArgAction::Append)
                        .conflicts_with("config"),
                ),
        )
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .value_name("PATH")
        .help("JSON configuration file")
        .value_parser(clap::value_parser!(PathBuf))
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("inject", sub)) => inject(sub),
        Some(("shade", sub)) => shade(sub),
        _ => bail!("no subcommand given"),
    }
}

fn load_config(matches: &ArgMatches) -> Result<ModutilConfig> {
    let path = matches
        .get_one::<PathBuf>("config")
        .context("--config is required")?;
    debug!(config = %path.display(), "loading configuration");
    ModutilConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

fn inject(matches: &ArgMatches) -> Result<()> {
    let mut config = load_config(matches)?;
    if matches.get_flag("ignore-cache") {
        if let Some(inject) = config.inject.as_mut() {
            inject.ignore_cache = true;
        }
    }

    let chain = config.build_chain().context("building constant providers")?;
    let mut task = config
        .build_injection_task()
        .context("configuring injection task")?;

    match task.run(&chain).context("injecting constants")? {
        TaskOutcome::UpToDate => println!("{}: up to date", task.name()),
        TaskOutcome::Executed(summary) => println!(
            "{}: {} files ({} rewritten, {} copied), {} constants consumed",
            task.name(),
            summary.files_processed,
            summary.files_rewritten,
            summary.files_copied,
            summary.consumed.len()
        ),
    }
    Ok(())
}

fn shade(matches: &ArgMatches) -> Result<()> {
    let task = if matches.contains_id("config") {
        load_config(matches)?
            .build_shade_task()
            .context("configuring shade task")?
    } else {
        let input = matches
            .get_one::<PathBuf>("input")
            .context("--input is required")?;
        let output = matches
            .get_one::<PathBuf>("output")
            .context("--output is required")?;
        let mut remapper = ShadeRemapper::new();
        for rename in matches.get_many::<String>("rename").into_iter().flatten() {
            let (from, to) = parse_rename(rename)?;
            remapper.add_rename(from, to)?;
        }
        ShadeTask::new(input, output, remapper)
    };

    let summary = task
        .run()
        .with_context(|| format!("shading {}", task.input().display()))?;
    println!(
        "{}: {} entries, {} of {} classes rewritten, {} renamed",
        task.output().display(),
        summary.entries,
        summary.classes_rewritten,
        summary.classes,
        summary.renamed
    );
    Ok(())
}

fn parse_rename(text: &str) -> Result<(&str, &str)> {
    match text.split_once('=') {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok((from.trim(), to.trim())),
        _ => bail!("rename `{text}` is not of the form FROM=TO"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_parse_rename() {
        assert_eq!(parse_rename("a.b=x.y").unwrap(), ("a.b", "x.y"));
        assert!(parse_rename("a.b").is_err());
        assert!(parse_rename("=x").is_err());
    }

    #[test]
    fn test_shade_arguments() {
        let matches = command()
            .try_get_matches_from([
                "modutil", "shade", "--input", "in.jar", "--output", "out.jar", "--rename",
                "a=b", "--rename", "c=d",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let renames: Vec<&String> = sub.get_many::<String>("rename").unwrap().collect();
        assert_eq!(renames, ["a=b", "c=d"]);

        assert!(command()
            .try_get_matches_from(["modutil", "shade", "--input", "in.jar"])
            .is_err());
        assert!(command()
            .try_get_matches_from(["modutil", "shade", "-c", "m.json", "--input", "in.jar"])
            .is_err());
    }

    #[test]
    fn test_inject_command() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("src/demo"))?;
        fs::write(
            dir.path().join("src/demo/Version.java"),
            "package demo;\n\nclass Version {\n    @demo.Const(\"version\") static final String VERSION = \"\";\n}\n",
        )?;
        let config = dir.path().join("modutil.json");
        fs::write(
            &config,
            r#"{
                "constants": { "annotation": "demo.Const", "values": { "version": "3.1" } },
                "inject": {
                    "sources": [{ "from": "src", "into": "java" }],
                    "destination": "out",
                    "build_dir": "build"
                }
            }"#,
        )?;

        let config_arg = config.to_string_lossy().to_string();
        let matches =
            command().try_get_matches_from(["modutil", "inject", "--config", config_arg.as_str()])?;
        run(&matches)?;

        let written = fs::read_to_string(dir.path().join("out/java/demo/Version.java"))?;
        assert!(written.contains("VERSION = \"3.1\";"));
        assert!(dir.path().join("build/injectConstants/constantscache.txt").exists());
        Ok(())
    }
}
