//! The ordered CSS transform chain.
//!
//! ```text
//! utilities → color-functions → preset-env → vendor-prefixes [→ purge → minify]
//! ```
//!
//! The bracketed transforms are appended in production only. The three
//! lowering passes each run `lightningcss` against the configured browser
//! targets with every feature except their own excluded, so each pass does
//! exactly one job and the chain order is observable.

use super::purge::Purge;
use crate::config::{BrowserTargets, CommandConfig};
use crate::context::BuildContext;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Features, Targets};
use std::collections::HashSet;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

/// One step in the chain: CSS in, CSS out.
pub trait CssTransform: Send + Sync {
    fn name(&self) -> &'static str;

    /// `filename` is used in error messages only.
    fn apply(&self, css: &str, filename: &str) -> Result<String, String>;
}

pub struct TransformChain {
    transforms: Vec<Box<dyn CssTransform>>,
}

impl TransformChain {
    pub fn new(transforms: Vec<Box<dyn CssTransform>>) -> Self {
        Self { transforms }
    }

    /// The fixed chain for the build's environment.
    pub fn for_context(ctx: &BuildContext) -> Result<Self, super::StyleError> {
        let styles = &ctx.config().stylesheets;
        let targets = browsers(&styles.browsers);
        let mut transforms: Vec<Box<dyn CssTransform>> = vec![
            Box::new(Utilities {
                command: styles.utilities.clone(),
            }),
            Box::new(Lower::color_functions(targets)),
            Box::new(Lower::preset_env(targets)),
            Box::new(Lower::vendor_prefixes(targets)),
        ];
        if ctx.is_production() {
            let purge = Purge::scan(ctx.paths(), &ctx.config().purge)?;
            transforms.push(Box::new(purge));
            transforms.push(Box::new(Minify { targets }));
        }
        Ok(Self::new(transforms))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    /// Run every transform in order. On failure returns the failing
    /// transform's name with its message.
    pub fn apply(&self, css: &str, filename: &str) -> Result<String, (&'static str, String)> {
        let mut current = css.to_string();
        for transform in &self.transforms {
            current = transform
                .apply(&current, filename)
                .map_err(|message| (transform.name(), message))?;
        }
        Ok(current)
    }
}

/// Convert configured major versions into `lightningcss` browser targets.
pub fn browsers(targets: &BrowserTargets) -> Option<Browsers> {
    let version = |major: Option<u32>| major.map(|m| m << 16);
    let browsers = Browsers {
        chrome: version(targets.chrome),
        edge: version(targets.edge),
        firefox: version(targets.firefox),
        safari: version(targets.safari),
        ios_saf: version(targets.ios_saf),
        ..Browsers::default()
    };
    if browsers == Browsers::default() {
        None
    } else {
        Some(browsers)
    }
}

/// Parse, minify with `options`, then print.
pub(crate) fn rewrite(
    css: &str,
    filename: &str,
    options: MinifyOptions,
    minify: bool,
) -> Result<String, String> {
    let targets = options.targets;
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| e.to_string())?;
    sheet.minify(options).map_err(|e| e.to_string())?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(printed.code)
}

/// Utility-class generation through an external command.
///
/// The command receives the stylesheet on stdin and must print the
/// expanded stylesheet on stdout. Without a command CSS passes through.
pub struct Utilities {
    pub command: Option<CommandConfig>,
}

impl CssTransform for Utilities {
    fn name(&self) -> &'static str {
        "utilities"
    }

    fn apply(&self, css: &str, _filename: &str) -> Result<String, String> {
        let Some(command) = &self.command else {
            return Ok(css.to_string());
        };
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to start {}: {e}", command.program))?;

        let mut stdin = child.stdin.take().ok_or("stdin unavailable")?;
        let input = css.to_string();
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));
        let output = child.wait_with_output().map_err(|e| e.to_string())?;
        let written = writer
            .join()
            .map_err(|_| "stdin writer panicked".to_string())?;

        if !output.status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                command.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        // A command may succeed without reading all of its input.
        match written {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e.to_string()),
            _ => {}
        }
        String::from_utf8(output.stdout).map_err(|e| e.to_string())
    }
}

/// A `lightningcss` lowering pass limited to one family of features.
pub struct Lower {
    name: &'static str,
    targets: Targets,
}

impl Lower {
    fn only(name: &'static str, browsers: Option<Browsers>, exclude: Features) -> Self {
        Self {
            name,
            targets: Targets {
                browsers,
                include: Features::empty(),
                exclude,
            },
        }
    }

    /// `lab()`, `color-mix()`, `hwb()` and friends.
    pub fn color_functions(browsers: Option<Browsers>) -> Self {
        Self::only(
            "color-functions",
            browsers,
            Features::all().difference(Features::Colors),
        )
    }

    /// Nesting, media ranges, logical properties and other newer syntax.
    pub fn preset_env(browsers: Option<Browsers>) -> Self {
        Self::only(
            "preset-env",
            browsers,
            Features::Colors | Features::VendorPrefixes,
        )
    }

    pub fn vendor_prefixes(browsers: Option<Browsers>) -> Self {
        Self::only(
            "vendor-prefixes",
            browsers,
            Features::all().difference(Features::VendorPrefixes),
        )
    }
}

impl CssTransform for Lower {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, css: &str, filename: &str) -> Result<String, String> {
        let options = MinifyOptions {
            targets: self.targets,
            unused_symbols: HashSet::new(),
        };
        rewrite(css, filename, options, false)
    }
}

pub struct Minify {
    pub targets: Option<Browsers>,
}

impl CssTransform for Minify {
    fn name(&self) -> &'static str {
        "minify"
    }

    fn apply(&self, css: &str, filename: &str) -> Result<String, String> {
        let options = MinifyOptions {
            targets: Targets {
                browsers: self.targets,
                include: Features::empty(),
                exclude: Features::all(),
            },
            unused_symbols: HashSet::new(),
        };
        rewrite(css, filename, options, true)
    }
}
