/*!
# Constant Injection Integration Tests

Runs the injection task over a small source tree configured from JSON.
*/

use std::fs;
use std::path::Path;

use modutil_core::{CacheGuard, ModutilConfig, ModutilError, TaskOutcome};
use pretty_assertions::assert_eq;

const GREETER: &str = r#"package demo;

import net.example.*;

public final class Greeter {
    @Inject("greeting")
    public static final String GREETING = "dev";

    @Inject("build")
    public static final int BUILD = 0;

    public interface Limits {
        @Inject("max_size") long MAX_SIZE = 1L;
    }

    private String notConstant = "untouched";
}
"#;

const MOD_JSON: &str = "{\n  \"version\": \"${version}\",\n  \"unknown\": \"${nope}\"\n}\n";

const LOGO: &[u8] = &[0x89, b'P', b'N', b'G', 0xFF, 0x00];

struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let java = dir.path().join("src/main/java/demo");
        let resources = dir.path().join("src/main/resources");
        fs::create_dir_all(&java)?;
        fs::create_dir_all(resources.join("assets"))?;
        fs::write(java.join("Greeter.java"), GREETER)?;
        fs::write(resources.join("mod.json"), MOD_JSON)?;
        fs::write(resources.join("assets/logo.png"), LOGO)?;
        fs::write(dir.path().join("gradle.properties"), "version=1.2.0\n")?;
        Ok(Self { dir })
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self, greeting: &str, ignore_cache: bool) -> anyhow::Result<ModutilConfig> {
        let text = format!(
            r#"{{
                "constants": {{
                    "annotation": "net.example.Inject",
                    "values": {{ "greeting": "{greeting}", "build": 42, "max_size": {{"long": 4096}} }},
                    "properties_files": ["gradle.properties"],
                    "patterns": [{{ "path": "main/resources/.*\\.json", "content": "\\$\\{{(\\w+)\\}}" }}]
                }},
                "inject": {{
                    "sources": [
                        {{ "from": "src/main/java", "into": "main/java" }},
                        {{ "from": "src/main/resources", "into": "main/resources" }}
                    ],
                    "destination": "build/sources",
                    "build_dir": "build/tmp",
                    "ignore_cache": {ignore_cache}
                }}
            }}"#
        );
        let path = self.root().join("modutil.json");
        fs::write(&path, text)?;
        Ok(ModutilConfig::load(&path)?)
    }

    fn output(&self, relative: &str) -> std::path::PathBuf {
        self.root().join("build/sources").join(relative)
    }
}

fn run(config: &ModutilConfig) -> anyhow::Result<TaskOutcome> {
    let chain = config.build_chain()?;
    let mut task = config.build_injection_task()?;
    Ok(task.run(&chain)?)
}

#[test]
fn test_injects_sources_and_resources() -> anyhow::Result<()> {
    let project = Project::new()?;
    let outcome = run(&project.config("hi", false)?)?;

    let summary = outcome.summary().expect("task should execute");
    assert_eq!(summary.files_processed, 3);
    assert_eq!(summary.files_rewritten, 2);
    assert_eq!(summary.files_copied, 1);
    assert!(summary.cache_written);

    let java = fs::read_to_string(project.output("main/java/demo/Greeter.java"))?;
    let expected = GREETER
        .replace("GREETING = \"dev\"", "GREETING = \"hi\"")
        .replace("BUILD = 0", "BUILD = 42")
        .replace("MAX_SIZE = 1L", "MAX_SIZE = 4096L");
    assert_eq!(java, expected);

    let json = fs::read_to_string(project.output("main/resources/mod.json"))?;
    assert_eq!(json, "{\n  \"version\": \"1.2.0\",\n  \"unknown\": \"${nope}\"\n}\n");

    assert_eq!(fs::read(project.output("main/resources/assets/logo.png"))?, LOGO);
    Ok(())
}

#[test]
fn test_cache_records_consumed_constants() -> anyhow::Result<()> {
    let project = Project::new()?;
    run(&project.config("hi", false)?)?;

    let cache = fs::read_to_string(
        project
            .root()
            .join("build/tmp/injectConstants/constantscache.txt"),
    )?;
    assert_eq!(
        cache,
        "build=42\ngreeting=hi\nmax_size=4096\nnope\nversion=1.2.0\n"
    );
    Ok(())
}

#[test]
fn test_second_run_is_up_to_date_until_a_constant_changes() -> anyhow::Result<()> {
    let project = Project::new()?;
    assert!(!run(&project.config("hi", false)?)?.is_up_to_date());
    assert!(run(&project.config("hi", false)?)?.is_up_to_date());

    let outcome = run(&project.config("hello", false)?)?;
    assert!(!outcome.is_up_to_date());
    let java = fs::read_to_string(project.output("main/java/demo/Greeter.java"))?;
    assert!(java.contains("GREETING = \"hello\";"));
    Ok(())
}

#[test]
fn test_deleted_output_forces_a_run() -> anyhow::Result<()> {
    let project = Project::new()?;
    run(&project.config("hi", false)?)?;
    fs::remove_dir_all(project.root().join("build/sources"))?;

    assert!(!run(&project.config("hi", false)?)?.is_up_to_date());
    assert!(project.output("main/java/demo/Greeter.java").exists());
    Ok(())
}

#[test]
fn test_ignore_cache_always_runs_and_skips_cache() -> anyhow::Result<()> {
    let project = Project::new()?;
    let config = project.config("hi", true)?;

    for _ in 0..2 {
        let outcome = run(&config)?;
        assert!(!outcome.is_up_to_date());
        assert!(!outcome.summary().is_some_and(|s| s.cache_written));
    }
    let guard = CacheGuard::for_task(&project.root().join("build/tmp"), "injectConstants");
    assert!(guard.load()?.is_none());
    Ok(())
}

#[test]
fn test_unparsable_source_fails_the_run() -> anyhow::Result<()> {
    let project = Project::new()?;
    fs::write(
        project.root().join("src/main/java/demo/Broken.java"),
        "class Broken {",
    )?;

    let chain = project.config("hi", false)?.build_chain()?;
    let mut task = project.config("hi", false)?.build_injection_task()?;
    let err = task.run(&chain).unwrap_err();

    assert!(matches!(err, ModutilError::Source(_)));
    assert!(err.to_string().contains("Broken.java"));
    Ok(())
}

#[test]
fn test_missing_source_directory_is_skipped() -> anyhow::Result<()> {
    let project = Project::new()?;
    fs::remove_dir_all(project.root().join("src/main/resources"))?;

    let outcome = run(&project.config("hi", false)?)?;
    assert_eq!(outcome.summary().map(|s| s.files_processed), Some(1));
    Ok(())
}
