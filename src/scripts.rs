//! Script bundling.
//!
//! Bundling is delegated: the build only decides *what* to bundle (entries,
//! externals, public path, mode) and hands that to a [`ScriptBundler`].
//!
//! | Bundler | Used when | Behavior |
//! |---|---|---|
//! | [`CommandBundler`] | `[javascripts.bundler]` is set | runs the configured program |
//! | [`ConcatBundler`] | no bundler configured | concatenates each entry's files |

use crate::config::CommandConfig;
use crate::context::BuildContext;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bundle '{bundle}' entry not found: {path}")]
    MissingEntry { bundle: String, path: PathBuf },
    #[error("Bundler {program} failed: {message}")]
    Command { program: String, message: String },
}

/// Everything a bundler needs for one build.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleJob {
    pub production: bool,
    pub src_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub public_path: String,
    /// Bundle name → entry files relative to `src_dir`.
    pub entries: BTreeMap<String, Vec<String>>,
    /// Module name → global provided by the page.
    pub externals: BTreeMap<String, String>,
}

impl BundleJob {
    pub fn from_context(ctx: &BuildContext) -> Self {
        let js = &ctx.config().javascripts;
        Self {
            production: ctx.is_production(),
            src_dir: ctx.paths().scripts_src.clone(),
            dest_dir: ctx.paths().scripts_dest.clone(),
            public_path: js.public_path.clone(),
            entries: js.entries.clone(),
            externals: js.externals.clone(),
        }
    }

    pub fn mode(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "development"
        }
    }

    /// Output file for a bundle.
    pub fn output(&self, bundle: &str) -> PathBuf {
        self.dest_dir.join(format!("{bundle}.js"))
    }
}

pub trait ScriptBundler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce one output per entry. Returns the written files.
    fn bundle(&self, job: &BundleJob) -> Result<Vec<PathBuf>, ScriptError>;
}

/// The bundler configured for a project.
pub fn bundler_for(command: Option<&CommandConfig>) -> Box<dyn ScriptBundler> {
    match command {
        Some(command) => Box::new(CommandBundler {
            command: command.clone(),
        }),
        None => Box::new(ConcatBundler),
    }
}

/// Runs an external bundler with the job described on the command line:
///
/// ```text
/// <program> <args...> --mode production --src <dir> --dest <dir>
///     --public-path /assets/javascripts --entry app=./app.js --external jquery=jQuery
/// ```
pub struct CommandBundler {
    pub command: CommandConfig,
}

impl CommandBundler {
    pub fn arguments(&self, job: &BundleJob) -> Vec<String> {
        let mut args = self.command.args.clone();
        args.extend([
            "--mode".to_string(),
            job.mode().to_string(),
            "--src".to_string(),
            job.src_dir.display().to_string(),
            "--dest".to_string(),
            job.dest_dir.display().to_string(),
            "--public-path".to_string(),
            job.public_path.clone(),
        ]);
        for (name, files) in &job.entries {
            for file in files {
                args.push("--entry".to_string());
                args.push(format!("{name}={file}"));
            }
        }
        for (module, global) in &job.externals {
            args.push("--external".to_string());
            args.push(format!("{module}={global}"));
        }
        args
    }
}

impl ScriptBundler for CommandBundler {
    fn name(&self) -> &'static str {
        "command"
    }

    fn bundle(&self, job: &BundleJob) -> Result<Vec<PathBuf>, ScriptError> {
        fs::create_dir_all(&job.dest_dir)?;
        let program = self.command.program.clone();
        let output = Command::new(&program)
            .args(self.arguments(job))
            .output()
            .map_err(|e| ScriptError::Command {
                program: program.clone(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ScriptError::Command {
                program,
                message: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(job
            .entries
            .keys()
            .map(|name| job.output(name))
            .filter(|p| p.exists())
            .collect())
    }
}

/// Concatenates each bundle's entry files in declared order.
pub struct ConcatBundler;

fn entry_path(src_dir: &Path, file: &str) -> PathBuf {
    src_dir.join(file.trim_start_matches("./"))
}

impl ScriptBundler for ConcatBundler {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn bundle(&self, job: &BundleJob) -> Result<Vec<PathBuf>, ScriptError> {
        let mut written = Vec::new();
        for (name, files) in &job.entries {
            let mut parts = Vec::with_capacity(files.len());
            for file in files {
                let path = entry_path(&job.src_dir, file);
                if !path.is_file() {
                    return Err(ScriptError::MissingEntry {
                        bundle: name.clone(),
                        path,
                    });
                }
                parts.push(fs::read_to_string(&path)?.trim_end().to_string());
            }
            let output = job.output(name);
            fs::create_dir_all(&job.dest_dir)?;
            fs::write(&output, format!("{}\n", parts.join("\n;\n")))?;
            written.push(output);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job(tmp: &TempDir) -> BundleJob {
        BundleJob {
            production: true,
            src_dir: tmp.path().join("src/javascripts"),
            dest_dir: tmp.path().join("public/javascripts"),
            public_path: "/assets/javascripts".into(),
            entries: BTreeMap::from([(
                "app".to_string(),
                vec!["./vendor.js".to_string(), "./app.js".to_string()],
            )]),
            externals: BTreeMap::from([("jquery".to_string(), "jQuery".to_string())]),
        }
    }

    #[test]
    fn concat_joins_entries_in_order() {
        let tmp = TempDir::new().unwrap();
        let j = job(&tmp);
        fs::create_dir_all(&j.src_dir).unwrap();
        fs::write(j.src_dir.join("vendor.js"), "var v = 1;\n").unwrap();
        fs::write(j.src_dir.join("app.js"), "init(v);\n").unwrap();

        let out = ConcatBundler.bundle(&j).unwrap();
        assert_eq!(out, vec![j.dest_dir.join("app.js")]);
        assert_eq!(fs::read_to_string(&out[0]).unwrap(), "var v = 1;\n;\ninit(v);\n");
    }

    #[test]
    fn concat_missing_entry_names_bundle() {
        let tmp = TempDir::new().unwrap();
        let err = ConcatBundler.bundle(&job(&tmp)).unwrap_err();
        match err {
            ScriptError::MissingEntry { bundle, path } => {
                assert_eq!(bundle, "app");
                assert!(path.ends_with("vendor.js"));
            }
            other => panic!("expected MissingEntry, got {other:?}"),
        }
    }

    #[test]
    fn command_arguments_carry_job() {
        let tmp = TempDir::new().unwrap();
        let bundler = CommandBundler {
            command: CommandConfig {
                program: "esbuild-wrapper".into(),
                args: vec!["--quiet".into()],
            },
        };
        let args = bundler.arguments(&job(&tmp));
        assert_eq!(args[0], "--quiet");
        let joined = args.join(" ");
        assert!(joined.contains("--mode production"));
        assert!(joined.contains("--public-path /assets/javascripts"));
        assert!(joined.contains("--entry app=./vendor.js --entry app=./app.js"));
        assert!(joined.contains("--external jquery=jQuery"));
    }

    #[test]
    fn command_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let bundler = CommandBundler {
            command: CommandConfig {
                program: "assetline-no-such-bundler".into(),
                args: vec![],
            },
        };
        assert!(matches!(
            bundler.bundle(&job(&tmp)),
            Err(ScriptError::Command { .. })
        ));
    }

    #[test]
    fn default_bundler_is_concat() {
        assert_eq!(bundler_for(None).name(), "concat");
    }
}
