use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::info;

use crate::bridge::{Handler, Session};
use crate::lisp::Value;
use crate::project::Workspace;

/// Bridge methods over a [`Workspace`].
#[derive(Debug)]
pub struct ClasspathHandler {
    workspace: Workspace,
}

impl ClasspathHandler {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

impl Handler for ClasspathHandler {
    fn methods(&self) -> Vec<&'static str> {
        vec![
            "set-project-classpath",
            "qualified-names",
            "reload-classes",
            "project-classpath",
            "class-path-entries",
            "preload",
            "ping",
        ]
    }

    fn call(&mut self, method: &str, args: &[Value], _session: &mut Session<'_>) -> Result<Value> {
        match method {
            "set-project-classpath" => {
                let classpath = string_arg(method, args, 0)?;
                let project = self.workspace.set_project(classpath);
                info!(entries = project.entries().len(), "project classpath set");
                Ok(Value::T)
            }
            "qualified-names" => {
                let name = string_arg(method, args, 0)?;
                Ok(Value::from(self.workspace.qualified_names(name)))
            }
            "reload-classes" => {
                let entry = optional_string_arg(method, args, 0)?;
                Ok(Value::from(self.workspace.reload(entry.map(Path::new))))
            }
            "project-classpath" => Ok(Value::from(self.workspace.current().classpath())),
            "class-path-entries" => {
                let entries = self
                    .workspace
                    .current()
                    .entries()
                    .iter()
                    .map(|e| e.describe())
                    .collect::<Vec<_>>();
                Ok(Value::from(entries))
            }
            "preload" => Ok(Value::from(self.workspace.current().preload())),
            "ping" => Ok(Value::T),
            other => bail!("Unknown method: {other}"),
        }
    }
}

fn string_arg<'a>(method: &str, args: &'a [Value], idx: usize) -> Result<&'a str> {
    optional_string_arg(method, args, idx)?
        .with_context(|| format!("{method}: missing argument {}", idx + 1))
}

fn optional_string_arg<'a>(method: &str, args: &'a [Value], idx: usize) -> Result<Option<&'a str>> {
    match args.get(idx) {
        None => Ok(None),
        Some(v) if v.is_nil() => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s)),
        Some(other) => bail!("{method}: argument {} must be a string, got {other}", idx + 1),
    }
}
