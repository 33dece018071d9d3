// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Every key of `mds.toml` is listed in [`KEYS`] together with what it
//! controls. Figment failures and validation problems are turned into miette
//! reports that point at the offending line, explain the key, and show both
//! ways of setting it (file and `MDS_*` variable).

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity of key names to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// One documented configuration key.
#[derive(Debug, Clone, Copy)]
pub struct KeyDoc {
    /// Dotted path, e.g. `radio.pickup_timeout_secs`.
    pub path: &'static str,
    pub about: &'static str,
    /// Example value as written in TOML.
    pub example: &'static str,
}

pub const KEYS: &[KeyDoc] = &[
    KeyDoc {
        path: "log_level",
        about: "log level of the `mds` targets",
        example: "\"info\"",
    },
    KeyDoc {
        path: "storage.data_dir",
        about: "directory holding logistics.db and radio.db",
        example: "\"/var/lib/mds\"",
    },
    KeyDoc {
        path: "storage.wal_mode",
        about: "SQLite write-ahead logging for both databases",
        example: "true",
    },
    KeyDoc {
        path: "bus.address",
        about: "event bus endpoint, only \"in-process\" is available",
        example: "\"in-process\"",
    },
    KeyDoc {
        path: "bus.capacity",
        about: "events queued per subscriber before outbox relays wait",
        example: "1024",
    },
    KeyDoc {
        path: "outbox.relay_interval_ms",
        about: "fallback poll interval of the outbox relays",
        example: "500",
    },
    KeyDoc {
        path: "outbox.batch_size",
        about: "outbox rows published per round",
        example: "100",
    },
    KeyDoc {
        path: "logistics.periodic_delivery_check_interval_secs",
        about: "how often active deliveries are looked after",
        example: "30",
    },
    KeyDoc {
        path: "logistics.periodic_delivery_warn_threshold_ms",
        about: "delivery sweeps slower than this are logged as warnings",
        example: "1000",
    },
    KeyDoc {
        path: "radio.pickup_timeout_check_interval_secs",
        about: "how often held radio deliveries are checked for pickup timeout",
        example: "10",
    },
    KeyDoc {
        path: "radio.pickup_timeout_secs",
        about: "how long an operator may hold a picked-up radio delivery before it is offered again (required)",
        example: "300",
    },
    KeyDoc {
        path: "radio.notify_request_buffer",
        about: "pending operator notification requests",
        example: "256",
    },
];

pub fn key_doc(path: &str) -> Option<&'static KeyDoc> {
    KEYS.iter().find(|doc| doc.path == path)
}

/// Environment variable overriding `path`.
pub fn env_var(path: &str) -> String {
    format!("MDS_{}", path.replace('.', "_").to_uppercase())
}

/// Help line for a key: what it does and how to set it.
pub fn key_help(path: &str) -> Option<String> {
    let doc = key_doc(path)?;
    let setting = match path.split_once('.') {
        Some((section, name)) => format!("`{name} = {}` under [{section}]", doc.example),
        None => format!("`{path} = {}`", doc.example),
    };
    Some(format!("{}; set {setting} or {}", doc.about, env_var(path)))
}

/// A configuration problem, rendered by miette.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(code(mds::config::unknown_key))]
    UnknownKey {
        /// Dotted path of the unrecognized key.
        key: String,
        /// Closest known key, possibly in another section.
        suggestion: Option<String>,
        #[help]
        help: Option<String>,
        #[label("not an mds setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid value for `{key}`: found {found}, expected {expected}")]
    #[diagnostic(code(mds::config::invalid_type))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[help]
        help: Option<String>,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(code(mds::config::missing_key))]
    MissingKey {
        key: String,
        #[help]
        help: Option<String>,
    },

    #[error("invalid `{key}`: {message}")]
    #[diagnostic(code(mds::config::invalid_value))]
    Invalid {
        key: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(mds::config::other))]
    Other(String),
}

impl ConfigError {
    pub fn missing(key: &str) -> Self {
        Self::MissingKey {
            key: key.to_string(),
            help: key_help(key),
        }
    }

    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
            help: key_help(key),
        }
    }

    /// Dotted path of the key this error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::UnknownKey { key, .. }
            | Self::InvalidType { key, .. }
            | Self::MissingKey { key, .. }
            | Self::Invalid { key, .. } => Some(key.as_str()),
            Self::Other(_) => None,
        }
    }
}

fn join_path(section: &[String], field: &str) -> String {
    section
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(field))
        .collect::<Vec<_>>()
        .join(".")
}

/// Closest documented key to `section.unknown`.
///
/// Key names are compared without their section, so a key placed in the
/// wrong table (`pickup_timeout_secs` under `[logistics]`) still finds its
/// real home. Ties prefer the section the key was written in.
pub fn suggest_key(section: &[String], unknown: &str) -> Option<String> {
    let here = section.join(".");
    let mut best: Option<(f64, bool, &str)> = None;
    for doc in KEYS {
        let (doc_section, name) = doc.path.rsplit_once('.').unwrap_or(("", doc.path));
        let score = strsim::jaro_winkler(unknown, name);
        if score < SUGGESTION_THRESHOLD {
            continue;
        }
        let same_section = doc_section == here;
        let better = match best {
            None => true,
            Some((s, same, _)) => score > s || (score == s && same_section && !same),
        };
        if better {
            best = Some((score, same_section, doc.path));
        }
    }
    best.map(|(_, _, path)| path.to_string())
}

fn unknown_key_help(suggestion: Option<&str>, valid: &[&str]) -> String {
    let listing = if valid.is_empty() {
        String::new()
    } else {
        format!("; keys here: {}", valid.join(", "))
    };
    match suggestion.and_then(|s| key_help(s).map(|help| (s, help))) {
        Some((s, help)) => format!("did you mean `{s}`? {help}{listing}"),
        None => format!("see the mds.toml reference{listing}"),
    }
}

/// Byte offset of `field` inside table `section` of a TOML document.
///
/// Walks the document line by line tracking the current `[table]` header,
/// so a key of the same name in another table is never matched.
pub fn locate_key(content: &str, section: &[String], field: &str) -> Option<usize> {
    let wanted = section.join(".");
    let mut current = String::new();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if let Some(header) = trimmed.strip_prefix('[') {
            if let Some(end) = header.find(']') {
                current = header[..end].trim().to_string();
            }
        } else if current == wanted
            && let Some(rest) = trimmed.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Source text the error came from: the file figment names, or the only
/// source when figment names none (inline strings).
fn source_of<'a>(
    error: &figment::error::Error,
    sources: &'a [(String, String)],
) -> Option<&'a (String, String)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    match file {
        Some(path) => sources.iter().find(|(p, _)| *p == path),
        None if sources.len() == 1 => sources.first(),
        None => None,
    }
}

fn span_for(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    source_of(error, sources)
        .and_then(|(path, content)| {
            let offset = locate_key(content, section, field)?;
            Some((
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(path, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Convert a figment error, which may carry several failures, into
/// diagnostics. `sources` are `(path, content)` pairs of the TOML files that
/// were read.
pub fn figment_to_config_errors(err: figment::Error, sources: &[(String, String)]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let suggestion = suggest_key(&error.path, field);
                let (span, src) = span_for(&error, &error.path, field, sources);
                ConfigError::UnknownKey {
                    key: join_path(&error.path, field),
                    help: Some(unknown_key_help(suggestion.as_deref(), expected)),
                    suggestion,
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::missing(&join_path(&error.path, field)),
            Kind::InvalidType(found, expected) => {
                let key = error.path.join(".");
                let (span, src) = match error.path.split_last() {
                    Some((field, section)) => span_for(&error, section, field, sources),
                    None => (None, None),
                };
                ConfigError::InvalidType {
                    help: key_help(&key),
                    key,
                    found: found.to_string(),
                    expected: expected.clone(),
                    span,
                    src,
                }
            }
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Print diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}
