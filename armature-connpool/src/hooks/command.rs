//! Command descriptors and their textual form.

use thiserror::Error;

/// Maximum number of arguments or commands rendered into a statement.
const NUM_CMD_LIMIT: usize = 100;

/// Maximum number of distinct command names in a pipeline summary.
const NUM_NAME_LIMIT: usize = 10;

/// Outcome of a command that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The key or value does not exist. Not a failure.
    #[error("nil")]
    Nil,

    /// Error reply sent by the server.
    #[error("{0}")]
    Server(String),

    /// Transport failure while executing the command.
    #[error("I/O error: {0}")]
    Io(String),

    /// A hook aborted or rejected the command.
    #[error("Hook error: {0}")]
    Hook(String),
}

impl CommandError {
    /// Whether this is the "no value" sentinel.
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// A command as seen by hooks: its arguments and, once executed, its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    args: Vec<String>,
    err: Option<CommandError>,
}

impl Cmd {
    /// Create a command with its name as the first argument.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            args: vec![name.into()],
            err: None,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// All arguments, name included.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Lowercase command name.
    pub fn name(&self) -> String {
        self.args
            .first()
            .map(|name| name.to_lowercase())
            .unwrap_or_default()
    }

    /// Command name including the sub-command for container commands.
    ///
    /// `CLUSTER INFO` becomes `cluster INFO`; `GET k` stays `get`.
    pub fn full_name(&self) -> String {
        let name = self.name();
        match name.as_str() {
            "cluster" | "command" => match self.args.get(1) {
                Some(sub) => format!("{} {}", name, sub),
                None => name,
            },
            _ => name,
        }
    }

    /// Outcome of the command, if it failed.
    pub fn err(&self) -> Option<&CommandError> {
        self.err.as_ref()
    }

    /// Record the outcome of the command.
    pub fn set_err(&mut self, err: Option<CommandError>) {
        self.err = err;
    }
}

impl From<Vec<String>> for Cmd {
    fn from(args: Vec<String>) -> Self {
        Self { args, err: None }
    }
}

/// Render a command as a single statement.
pub fn cmd_string(cmd: &Cmd) -> String {
    let mut out = String::with_capacity(32);
    append_cmd(&mut out, cmd);
    out
}

/// Render a pipeline.
///
/// Returns the summary (distinct full names, space separated) and the
/// statements (one command per line).
pub fn cmds_string(cmds: &[Cmd]) -> (String, String) {
    let mut names: Vec<String> = Vec::with_capacity(NUM_NAME_LIMIT);
    let mut out = String::with_capacity(32 * cmds.len());

    for (i, cmd) in cmds.iter().enumerate() {
        if i > NUM_CMD_LIMIT {
            break;
        }
        if i > 0 {
            out.push('\n');
        }
        append_cmd(&mut out, cmd);

        if names.len() >= NUM_NAME_LIMIT {
            continue;
        }
        let name = cmd.full_name();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    (names.join(" "), out)
}

fn append_cmd(out: &mut String, cmd: &Cmd) {
    for (i, arg) in cmd.args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if i > NUM_CMD_LIMIT {
            out.push_str("...");
            break;
        }
        append_arg(out, arg);
    }

    if let Some(err) = &cmd.err {
        out.push_str(": ");
        out.push_str(&err.to_string());
    }
}

// Printable ASCII goes in as-is, anything else is hex encoded.
fn append_arg(out: &mut String, arg: &str) {
    if arg.bytes().all(|b| (0x21..=0x7e).contains(&b)) {
        out.push_str(arg);
    } else {
        out.push_str(&hex::encode(arg));
    }
}
