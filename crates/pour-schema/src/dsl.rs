//! Reader and writer for the host package manager's Ruby formula DSL.
//!
//! Only the declarative subset is understood:
//!
//! ```text
//! class GitAbsorb < Formula
//!   version "0.2.0"
//!   desc "..."
//!   homepage "https://..."
//!   url "https://.../v0.2.0.tar.gz"
//!   sha256 "9e87..."
//!
//!   depends_on "bash"
//!
//!   def install
//!     bin.install "bin/git-absorb"
//!     man1.install "man/git-absorb.1"
//!   end
//! end
//! ```
//!
//! Anything else (blocks, conditionals, interpolation) is rejected with the
//! offending line number rather than guessed at.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::formula::{Dependencies, Formula, PackageInfo, Source};
use crate::hash::Sha256Digest;
use crate::types::{InstallAction, InstallTarget, PackageName, Version};

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^class\s+([A-Z][A-Za-z0-9]*)\s*<\s*Formula$").expect("static regex")
});
static INSTALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z_0-9]+)\.install\s+(.+)$").expect("static regex"));
static STATEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z_0-9]+)\s+(.+)$").expect("static regex"));
static URL_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+\.\d+(?:\.\d+)?)").expect("static regex"));

/// Comment marker carrying `behavior_change`, which has no DSL statement.
const BEHAVIOR_CHANGE_MARKER: &str = "# behavior-change: ";

/// Errors raised while reading the DSL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DslError {
    /// No `class X < Formula` header was found.
    #[error("missing `class <Name> < Formula` header")]
    MissingClass,

    /// A required statement never appeared.
    #[error("missing required `{0}` statement")]
    MissingField(&'static str),

    /// A statement appeared more than once.
    #[error("line {line}: duplicate `{field}` statement")]
    Duplicate {
        /// 1-based line number.
        line: usize,
        /// Statement keyword.
        field: String,
    },

    /// A line could not be understood in its position.
    #[error("line {line}: unexpected `{text}`")]
    Unexpected {
        /// 1-based line number.
        line: usize,
        /// The trimmed line.
        text: String,
    },

    /// A statement's argument was malformed.
    #[error("line {line}: {message}")]
    BadValue {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// The file ended before the class (or install block) was closed.
    #[error("unexpected end of file: missing `end`")]
    UnterminatedBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Top,
    Class,
    Install,
    Done,
}

#[derive(Default)]
struct Fields {
    version: Option<String>,
    desc: Option<String>,
    homepage: Option<String>,
    url: Option<String>,
    sha256: Option<String>,
    sha256_line: usize,
    license: Option<String>,
    behavior_change: Option<String>,
}

/// Parse DSL source into a [`Formula`].
///
/// # Errors
///
/// Returns a [`DslError`] naming the first line that could not be read, or the
/// first required statement that is missing.
pub fn parse(source: &str) -> Result<Formula, DslError> {
    let mut state = State::Top;
    let mut class_name = None;
    let mut fields = Fields::default();
    let mut deps = Vec::new();
    let mut actions = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();

        if let Some(note) = text.strip_prefix(BEHAVIOR_CHANGE_MARKER.trim_end()) {
            if state == State::Class {
                fields.behavior_change = Some(note.trim().to_string());
            }
            continue;
        }
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        match state {
            State::Top => {
                let caps = CLASS_RE.captures(text).ok_or_else(|| unexpected(line, text))?;
                class_name = Some(caps[1].to_string());
                state = State::Class;
            }
            State::Class => {
                if text == "end" {
                    state = State::Done;
                } else if text == "def install" {
                    if !actions.is_empty() {
                        return Err(DslError::Duplicate {
                            line,
                            field: "def install".to_string(),
                        });
                    }
                    state = State::Install;
                } else {
                    let caps = STATEMENT_RE
                        .captures(text)
                        .ok_or_else(|| unexpected(line, text))?;
                    let keyword = &caps[1];
                    let args = parse_string_args(&caps[2], line)?;
                    let value = single_arg(keyword, args, line)?;

                    let slot = match keyword {
                        "version" => &mut fields.version,
                        "desc" => &mut fields.desc,
                        "homepage" => &mut fields.homepage,
                        "url" => &mut fields.url,
                        "sha256" => &mut fields.sha256,
                        "license" => &mut fields.license,
                        "depends_on" => {
                            deps.push(PackageName::new(&value));
                            continue;
                        }
                        _ => return Err(unexpected(line, text)),
                    };
                    if slot.is_some() {
                        return Err(DslError::Duplicate {
                            line,
                            field: keyword.to_string(),
                        });
                    }
                    *slot = Some(value);
                    if keyword == "sha256" {
                        fields.sha256_line = line;
                    }
                }
            }
            State::Install => {
                if text == "end" {
                    state = State::Class;
                    continue;
                }
                let caps = INSTALL_RE
                    .captures(text)
                    .ok_or_else(|| unexpected(line, text))?;
                let target = InstallTarget::parse(&caps[1]).ok_or_else(|| DslError::BadValue {
                    line,
                    message: format!("unknown install target `{}`", &caps[1]),
                })?;
                for path in parse_string_args(&caps[2], line)? {
                    actions.push(InstallAction::new(path, target));
                }
            }
            State::Done => return Err(unexpected(line, text)),
        }
    }

    match state {
        State::Done => {}
        State::Top => return Err(DslError::MissingClass),
        State::Class | State::Install => return Err(DslError::UnterminatedBlock),
    }

    let class_name = class_name.ok_or(DslError::MissingClass)?;
    let url = fields.url.ok_or(DslError::MissingField("url"))?;
    let sha256 = fields.sha256.ok_or(DslError::MissingField("sha256"))?;
    let sha256 = Sha256Digest::new(sha256).map_err(|e| DslError::BadValue {
        line: fields.sha256_line,
        message: e.to_string(),
    })?;
    let version = match fields.version {
        Some(v) => v,
        None => version_from_url(&url).ok_or(DslError::MissingField("version"))?,
    };

    Ok(Formula {
        package: PackageInfo {
            name: PackageName::from_class_name(&class_name),
            version: Version::from(version),
            description: fields.desc.ok_or(DslError::MissingField("desc"))?,
            homepage: fields.homepage.ok_or(DslError::MissingField("homepage"))?,
            license: fields.license,
            behavior_change: fields.behavior_change,
        },
        source: Source {
            url,
            sha256,
            format: None,
        },
        dependencies: Dependencies { runtime: deps },
        install: actions,
    })
}

/// Render a formula in the fixed DSL field layout.
pub fn render(formula: &Formula) -> String {
    let pkg = &formula.package;
    let mut out = String::new();

    let _ = writeln!(out, "class {} < Formula", pkg.name.class_name());
    if let Some(note) = &pkg.behavior_change {
        let _ = writeln!(out, "  {BEHAVIOR_CHANGE_MARKER}{note}");
    }
    let _ = writeln!(out, "  version {}", quote(pkg.version.as_str()));
    let _ = writeln!(out, "  desc {}", quote(&pkg.description));
    let _ = writeln!(out, "  homepage {}", quote(&pkg.homepage));
    if let Some(license) = &pkg.license {
        let _ = writeln!(out, "  license {}", quote(license));
    }
    let _ = writeln!(out, "  url {}", quote(&formula.source.url));
    let _ = writeln!(out, "  sha256 {}", quote(formula.source.sha256.as_str()));

    if !formula.dependencies.runtime.is_empty() {
        out.push('\n');
        for dep in &formula.dependencies.runtime {
            let _ = writeln!(out, "  depends_on {}", quote(dep.as_str()));
        }
    }

    out.push('\n');
    out.push_str("  def install\n");
    for action in &formula.install {
        let _ = writeln!(out, "    {}.install {}", action.target, quote(&action.source));
    }
    out.push_str("  end\n");
    out.push_str("end\n");
    out
}

/// Guess a version from the last path segment of a URL (`.../v0.2.0.tar.gz` -> `0.2.0`).
pub fn version_from_url(url: &str) -> Option<String> {
    let file = url.rsplit('/').next()?;
    URL_VERSION_RE
        .captures(file)
        .map(|caps| caps[1].to_string())
}

fn unexpected(line: usize, text: &str) -> DslError {
    DslError::Unexpected {
        line,
        text: text.to_string(),
    }
}

fn single_arg(keyword: &str, mut args: Vec<String>, line: usize) -> Result<String, DslError> {
    if args.len() == 1 {
        Ok(args.remove(0))
    } else {
        Err(DslError::BadValue {
            line,
            message: format!("`{keyword}` takes exactly one string, got {}", args.len()),
        })
    }
}

/// Parse `"a", 'b' # comment` into its string literals.
fn parse_string_args(input: &str, line: usize) -> Result<Vec<String>, DslError> {
    let bad = |message: &str| DslError::BadValue {
        line,
        message: message.to_string(),
    };

    let mut args = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let quote_char = match chars.next() {
            Some(q @ ('"' | '\'')) => q,
            Some('#') | None if !args.is_empty() => break,
            _ => return Err(bad("expected a string literal")),
        };

        let mut value = String::new();
        loop {
            match chars.next() {
                None => return Err(bad("unterminated string literal")),
                Some(c) if c == quote_char => break,
                Some('\\') => match chars.next() {
                    Some(escaped @ ('"' | '\'' | '\\')) => value.push(escaped),
                    Some('#') if quote_char == '"' => value.push('#'),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => return Err(bad("unterminated string literal")),
                },
                Some('#') if quote_char == '"' && chars.peek() == Some(&'{') => {
                    return Err(bad("string interpolation is not supported"));
                }
                Some(c) => value.push(c),
            }
        }
        args.push(value);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            Some(',') => {}
            Some('#') | None => break,
            Some(_) => return Err(bad("expected `,` between arguments")),
        }
    }

    Ok(args)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '#' => out.push_str("\\#"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
