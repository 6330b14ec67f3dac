//! Fallback extraction through `aapt dump badging`.
//!
//! The tool is optional. If it cannot be spawned or exits unsuccessfully the
//! stage contributes nothing. Only the `package:` and `application-label:`
//! lines of its output are understood; any other format yields empty fields.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace, warn};

const PACKAGE_PREFIX: &str = "package:";
const LABEL_PREFIX: &str = "application-label:";

static NAME_RE: Lazy<Regex> = Lazy::new(|| pattern(r"\bname='([^']+)'"));
static VERSION_NAME_RE: Lazy<Regex> = Lazy::new(|| pattern(r"versionName='([^']+)'"));
static VERSION_CODE_RE: Lazy<Regex> = Lazy::new(|| pattern(r"versionCode='([^']+)'"));
static LABEL_RE: Lazy<Regex> = Lazy::new(|| pattern(r"application-label:'([^']+)'"));

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("badging pattern is valid")
}

/// Trait for tools that can produce a badging dump for an APK
pub trait BadgingTool {
    /// Returns the tool's standard output, or `None` on any failure
    fn dump_badging(&self, apk: &Path) -> Option<String>;
}

/// Runs `<program> dump badging <apk>`
#[derive(Debug, Clone)]
pub struct Aapt {
    program: PathBuf,
}

impl Default for Aapt {
    fn default() -> Self {
        Self::new("aapt")
    }
}

impl Aapt {
    /// Creates a runner for the given executable name or path
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns the configured executable
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl BadgingTool for Aapt {
    fn dump_badging(&self, apk: &Path) -> Option<String> {
        trace!("Running {} dump badging {}", self.program.display(), apk.display());

        let output = match Command::new(&self.program)
            .args(["dump", "badging"])
            .arg(apk)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!("Badging tool {} unavailable: {}", self.program.display(), e);
                return None;
            }
        };

        if !output.status.success() {
            debug!(
                "{} exited with {} for {}",
                self.program.display(),
                output.status,
                apk.display()
            );
            return None;
        }

        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Fields recovered from a badging dump
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgingInfo {
    /// `name='...'` on the `package:` line
    pub package_name: Option<String>,
    /// `versionName='...'` on the `package:` line
    pub version_name: Option<String>,
    /// `versionCode='...'` on the `package:` line
    pub version_code: Option<String>,
    /// Value of the `application-label:` line
    pub label: Option<String>,
}

/// Classify trimmed lines by prefix and pull out the quoted values.
///
/// If a prefix repeats, the first line carrying a value wins.
pub fn parse_badging(output: &str) -> BadgingInfo {
    let mut info = BadgingInfo::default();

    for line in output.lines().map(str::trim) {
        if line.starts_with(PACKAGE_PREFIX) {
            fill(&mut info.package_name, &NAME_RE, line);
            fill(&mut info.version_name, &VERSION_NAME_RE, line);
            fill(&mut info.version_code, &VERSION_CODE_RE, line);
        } else if line.starts_with(LABEL_PREFIX) {
            fill(&mut info.label, &LABEL_RE, line);
        }
    }

    info
}

fn fill(slot: &mut Option<String>, re: &Regex, line: &str) {
    if slot.is_some() {
        return;
    }
    *slot = re
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
}
