use std::{
    collections::BTreeMap,
    os::unix::process::ExitStatusExt,
    process::{Command, Output},
};

use anyhow::{Context, Error};
use log::trace;

use super::CliRunner;

/// Key MAAS uses for validation errors that are not tied to a single field.
const NON_FIELD_ERRORS: &str = "__all__";

/// A MAAS CLI call that did not succeed.
///
/// On API errors the CLI exits non-zero and prints the server's reply on
/// stdout: either a short message such as `Not Found`, or a JSON object
/// mapping each rejected parameter to its problems. Python tracebacks of the
/// CLI itself land on stderr.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CliFailure {
    #[error("'{command}' exited with status {code}:\n{diagnostics}")]
    Exit {
        command: String,
        code: i32,
        diagnostics: String,
    },

    #[error("'{command}' was terminated by signal {signal}")]
    Signal { command: String, signal: i32 },
}

impl CliFailure {
    fn from_output(command: String, output: &Output) -> Self {
        match (output.status.code(), output.status.signal()) {
            (Some(code), _) => CliFailure::Exit {
                command,
                code,
                diagnostics: explain(
                    &String::from_utf8_lossy(&output.stdout),
                    &String::from_utf8_lossy(&output.stderr),
                ),
            },
            (None, Some(signal)) => CliFailure::Signal { command, signal },
            (None, None) => CliFailure::Exit {
                command,
                code: -1,
                diagnostics: "(unknown exit status)".into(),
            },
        }
    }
}

/// Turns what a failed call printed into readable diagnostics. Field
/// validation errors are listed one per line as `<field>: <problem>`.
pub(crate) fn explain(stdout: &str, stderr: &str) -> String {
    let stdout = stdout.trim();
    let mut lines = match serde_json::from_str::<BTreeMap<String, Vec<String>>>(stdout) {
        Ok(fields) => fields
            .iter()
            .flat_map(|(field, problems)| {
                problems.iter().map(move |problem| match field.as_str() {
                    NON_FIELD_ERRORS => problem.clone(),
                    _ => format!("{field}: {problem}"),
                })
            })
            .collect(),
        Err(_) if stdout.is_empty() => Vec::new(),
        Err(_) => vec![stdout.to_owned()],
    };

    let stderr = stderr.trim();
    if !stderr.is_empty() {
        lines.push(format!("stderr:\n{stderr}"));
    }

    if lines.is_empty() {
        "(no output)".into()
    } else {
        lines.join("\n")
    }
}

/// Renders a command line the way a shell user would type it.
pub(crate) fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|arg| {
            if arg.contains(' ') {
                format!("'{arg}'")
            } else {
                arg.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spawns the MAAS CLI as a child process.
pub struct ProcessRunner {
    program: String,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl CliRunner for ProcessRunner {
    fn run(&self, args: &[String]) -> Result<String, Error> {
        let rendered = render_command(&self.program, args);
        trace!("Executing '{rendered}'");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to start '{rendered}'"))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into());
        }

        let failure = CliFailure::from_output(rendered, &output);
        trace!("{failure}");
        Err(failure.into())
    }
}
