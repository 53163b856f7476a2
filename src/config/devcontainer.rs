// ABOUTME: Devcontainer discovery and parsing for a project directory
// Locates the container spec file, strips JSONC comments and parses it

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Candidate locations relative to the project root, in precedence order
const CONFIG_CANDIDATES: [&[&str]; 2] = [
    &[".devcontainer", "devcontainer.json"],
    &[".devcontainer.json"],
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Parsed container configuration for a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_create_command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forward_ports: Vec<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

/// What a launch would start from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchSource<'a> {
    /// A prebuilt image reference
    Image(&'a str),
    /// A Dockerfile build; `dockerfile` is known to be non-empty
    Dockerfile(&'a BuildSpec),
}

impl ContainerSpec {
    /// Classify the spec for launching. `None` means inspection only.
    pub fn launch_source(&self) -> Option<LaunchSource<'_>> {
        if let Some(image) = non_blank(self.image.as_deref()) {
            return Some(LaunchSource::Image(image));
        }

        self.build
            .as_ref()
            .filter(|build| non_blank(build.dockerfile.as_deref()).is_some())
            .map(LaunchSource::Dockerfile)
    }

    pub fn is_launchable(&self) -> bool {
        self.launch_source().is_some()
    }

    /// Post-create command, ignoring blank strings
    pub fn post_create(&self) -> Option<&str> {
        non_blank(self.post_create_command.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A spec together with the file it was read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub path: PathBuf,
    pub spec: ContainerSpec,
}

/// Finds and parses a project's devcontainer configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigResolver;

impl ConfigResolver {
    pub const fn new() -> Self {
        Self
    }

    /// Return the first candidate config file that exists under `project`
    pub fn locate(&self, project: &Path) -> Option<PathBuf> {
        CONFIG_CANDIDATES
            .iter()
            .map(|parts| parts.iter().fold(project.to_path_buf(), |acc, p| acc.join(p)))
            .find(|candidate| candidate.is_file())
    }

    /// Resolve the container spec for `project`.
    ///
    /// `Ok(None)` means no config file exists, which is a normal outcome.
    pub fn resolve(&self, project: &Path) -> Result<Option<Resolved>, ConfigError> {
        let Some(path) = self.locate(project) else {
            debug!("No devcontainer config under {}", project.display());
            return Ok(None);
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        match Self::parse_str(&content) {
            Ok(spec) => {
                info!("Loaded devcontainer config from {}", path.display());
                Ok(Some(Resolved { path, spec }))
            }
            Err(source) => {
                warn!("Failed to parse devcontainer config {}: {}", path.display(), source);
                Err(ConfigError::Parse { path, source })
            }
        }
    }

    /// Parse JSON-with-comments text into a spec
    pub fn parse_str(content: &str) -> Result<ContainerSpec, serde_json::Error> {
        serde_json::from_str(&strip_jsonc(content))
    }
}

/// Remove `//` and `/* */` comments and trailing commas outside string literals.
pub fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '/' if chars.peek() == Some(&'/') => {
                // Line comment: drop through end of line, keep the newline
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut body = String::new();
                let mut closed = false;
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        closed = true;
                        break;
                    }
                    body.push(next);
                    prev = next;
                }
                if closed {
                    out.extend(body.chars().filter(|&c| c == '\n'));
                    out.push(' ');
                } else {
                    // Unterminated: leave it in place so the parse fails
                    out.push_str("/*");
                    out.push_str(&body);
                }
            }
            _ => out.push(ch),
        }
    }

    strip_trailing_commas(&out)
}

fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(ch);
    }

    out
}
