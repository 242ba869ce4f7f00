// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! JUnit XML result merging.
//!
//! Projects may write a JUnit XML report at `<name>/<junit_output>`. After
//! tests ran, every `<testsuite>` element of those reports is copied into a
//! single `<testsuites>` document so CI can report on, and balance, the whole
//! monorepo at once.
//!
//! Copied elements are namespaced by project so identical test names from
//! different projects stay apart:
//!
//! - `file="./spec/a.js"` becomes `file="<name>/spec/a.js"`.
//! - `classname="Foo"` becomes `classname="<name>.Foo"`.
//! - `name="works"` becomes `name="[<name>] works"`.

use crate::registry::{ProjectRegistry, ProjectSet};

use quick_xml::{
    escape::escape,
    events::{attributes::Attribute, BytesStart, Event},
    Reader, Writer,
};
use std::{
    borrow::Cow,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Merge per-project JUnit XML reports into one.
#[derive(Debug, Clone)]
pub struct JunitMerger<'r> {
    registry: &'r ProjectRegistry,
    root: PathBuf,
}

impl<'r> JunitMerger<'r> {
    /// Construct new merger.
    ///
    /// Report paths are resolved relative to `root`.
    pub fn new(registry: &'r ProjectRegistry, root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            root: root.into(),
        }
    }

    /// Merge reports of selected projects into target output file.
    ///
    /// Missing reports are skipped. Parent directories of the output file
    /// are created as needed.
    ///
    /// # Errors
    ///
    /// - Return [`JunitError::Read`] if a report exists but cannot be read.
    /// - Return [`JunitError::Parse`] if a report is malformed.
    /// - Return [`JunitError::Write`] if the merged report cannot be written.
    #[instrument(skip(self, selected), level = "debug")]
    pub fn merge(&self, selected: &ProjectSet, output: &Path) -> Result<usize> {
        info!("merging JUnit XML outputs");
        let mut suites = Vec::new();
        for name in selected.iter() {
            let Some(junit_output) = self
                .registry
                .get(name)
                .and_then(|project| project.junit_output.as_ref())
            else {
                continue;
            };

            let relative = Path::new(name).join(junit_output);
            let path = self.root.join(&relative);
            if !path.exists() {
                info!("[{name}] {:?} not found, skipping", relative.display());
                continue;
            }

            info!("[{name}] parsing {:?}", relative.display());
            let content = read_to_string(&path).map_err(|err| JunitError::Read {
                source: err,
                path: path.clone(),
            })?;
            let found = extract_suites(name, &content).map_err(|err| JunitError::Parse {
                source: err,
                path: path.clone(),
            })?;
            suites.extend(found);
        }

        let document = render(&suites);
        let target = self.root.join(output);
        if let Some(parent) = target.parent() {
            mkdirp::mkdirp(parent).map_err(|err| JunitError::Write {
                source: err,
                path: target.clone(),
            })?;
        }
        write(&target, document).map_err(|err| JunitError::Write {
            source: err,
            path: target.clone(),
        })?;

        info!("written {} test suite(s) to {:?}", suites.len(), output.display());
        Ok(suites.len())
    }
}

/// Wrap test suites into a single document.
fn render(suites: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<testsuites>\n{}</testsuites>\n",
        suites.join("\n")
    )
}

/// Copy every top-level `<testsuite>` element out of a report.
fn extract_suites(project: &str, content: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(content);
    let mut suites = Vec::new();
    let mut current: Option<Writer<Vec<u8>>> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(start) => {
                if current.is_none() && start.name().as_ref() == b"testsuite" {
                    current = Some(Writer::new(Vec::new()));
                    depth = 0;
                }

                if let Some(writer) = current.as_mut() {
                    writer.write_event(Event::Start(namespaced(project, &start)?))?;
                    depth += 1;
                }
            }
            Event::End(end) => {
                if let Some(mut writer) = current.take() {
                    writer.write_event(Event::End(end))?;
                    depth -= 1;
                    if depth == 0 {
                        suites.push(into_string(writer));
                    } else {
                        current = Some(writer);
                    }
                }
            }
            Event::Empty(empty) => {
                let element = Event::Empty(namespaced(project, &empty)?);
                if let Some(writer) = current.as_mut() {
                    writer.write_event(element)?;
                } else if empty.name().as_ref() == b"testsuite" {
                    let mut writer = Writer::new(Vec::new());
                    writer.write_event(element)?;
                    suites.push(into_string(writer));
                }
            }
            event => {
                if let Some(writer) = current.as_mut() {
                    writer.write_event(event)?;
                }
            }
        }
    }

    Ok(suites)
}

/// Rewrite `file`, `classname`, and `name` attributes to carry project name.
fn namespaced(
    project: &str,
    element: &BytesStart<'_>,
) -> Result<BytesStart<'static>, quick_xml::Error> {
    let escaped = escape(project);
    let prefix = escaped.as_bytes();
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut rewritten = BytesStart::new(name);

    for attribute in element.attributes() {
        let attribute = attribute?;
        let value = attribute.value.as_ref();
        let value = match attribute.key.as_ref() {
            b"file" => {
                let value = value.strip_prefix(b"./").unwrap_or(value);
                [prefix, &b"/"[..], value].concat()
            }
            b"classname" => [prefix, &b"."[..], value].concat(),
            b"name" => [&b"["[..], prefix, &b"] "[..], value].concat(),
            _ => value.to_vec(),
        };

        rewritten.push_attribute(Attribute {
            key: attribute.key,
            value: Cow::Owned(value),
        });
    }

    Ok(rewritten)
}

fn into_string(writer: Writer<Vec<u8>>) -> String {
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}

/// JUnit merge error types.
#[derive(Debug, thiserror::Error)]
pub enum JunitError {
    /// Report exists but cannot be read.
    #[error("failed to read JUnit report at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Report is not well-formed XML.
    #[error("failed to parse JUnit report at {:?}", path.display())]
    Parse {
        #[source]
        source: quick_xml::Error,
        path: PathBuf,
    },

    /// Merged report cannot be written.
    #[error("failed to write merged JUnit report to {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = JunitError> = std::result::Result<T, E>;
