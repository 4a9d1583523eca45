use crate::logging::LogOptions;
use crate::snapshot::{EtcdSnapshotArgs, SnapshotOptions};
use clap::{Args, Parser, Subcommand};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Embedded tools that can be run through a link named after them (`kubectl get pods`).
pub const PASS_THROUGH_PROGRAMS: &[&str] = &["kubectl", "ctr", "crictl"];

/// What one launcher invocation resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationTarget {
    /// Stage the bundle and replace this process with an embedded executable.
    External(ExternalTarget),
    /// Run a command inside this process.
    InProcess(InProcessCommand),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalTarget {
    /// Looked up on the augmented search path.
    pub executable: String,
    pub data_dir: Option<PathBuf>,
    pub arg0: OsString,
    pub args: Vec<OsString>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InProcessCommand {
    EtcdSnapshot(SnapshotOptions),
}

enum Route {
    /// Re-exec as a role binary from the bundle, forwarding the whole command line.
    Wrapped(&'static str),
    /// Exec an embedded tool with everything after the subcommand name.
    PassThrough(&'static str),
    EtcdSnapshot(SnapshotOptions),
}

#[derive(Parser, Debug)]
#[command(
    name = "k3s",
    version,
    about = "Lightweight Kubernetes",
    subcommand_required = true,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run management server
    Server(RawArgs),
    /// Run node agent
    Agent(RawArgs),
    /// Run kubectl
    Kubectl(RawArgs),
    /// Run crictl
    Crictl(RawArgs),
    /// Run ctr
    Ctr(RawArgs),
    /// Run config check
    CheckConfig(RawArgs),
    /// Trigger an immediate etcd snapshot
    EtcdSnapshot(EtcdSnapshotArgs),
}

/// Arguments forwarded untouched to the target executable.
#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
struct RawArgs {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    _args: Vec<OsString>,
}

impl Command {
    fn route(self) -> Route {
        match self {
            Command::Server(_) => Route::Wrapped("k3s-server"),
            Command::Agent(_) => Route::Wrapped("k3s-agent"),
            Command::Kubectl(_) => Route::PassThrough("kubectl"),
            Command::Crictl(_) => Route::PassThrough("crictl"),
            Command::Ctr(_) => Route::PassThrough("ctr"),
            Command::CheckConfig(_) => Route::PassThrough("check-config"),
            Command::EtcdSnapshot(args) => Route::EtcdSnapshot(args.into_options()),
        }
    }
}

impl InvocationTarget {
    /// Decides what `argv` (including `argv[0]`) asks for.
    ///
    /// Usage errors, `--help` and `--version` come back as a [`clap::Error`]; the caller
    /// reports them with [`clap::Error::exit`].
    pub fn from_args(argv: &[OsString]) -> Result<Self, clap::Error> {
        if let Some(tool) = PASS_THROUGH_PROGRAMS
            .iter()
            .copied()
            .find(|tool| invoked_as(argv) == OsStr::new(tool))
        {
            return Ok(Self::External(pass_through(tool, argv.get(1..).unwrap_or(&[]))));
        }

        let cli = Cli::try_parse_from(argv)?;
        // A parsed subcommand is always `argv[1]`: the top level has no other options.
        let forwarded = argv.get(2..).unwrap_or(&[]);
        let target = match cli.command.route() {
            Route::Wrapped(entry) => Self::External(ExternalTarget {
                executable: entry.to_string(),
                data_dir: scan_data_dir(forwarded),
                arg0: argv.first().cloned().unwrap_or_else(|| OsString::from("k3s")),
                args: argv.get(1..).unwrap_or(&[]).to_vec(),
            }),
            Route::PassThrough(tool) => Self::External(pass_through(tool, forwarded)),
            Route::EtcdSnapshot(options) => {
                Self::InProcess(InProcessCommand::EtcdSnapshot(options))
            }
        };
        Ok(target)
    }

    pub fn log_options(&self) -> LogOptions {
        match self {
            Self::External(_) => LogOptions::default(),
            Self::InProcess(InProcessCommand::EtcdSnapshot(options)) => options.logging.clone(),
        }
    }
}

fn pass_through(tool: &str, args: &[OsString]) -> ExternalTarget {
    ExternalTarget {
        executable: tool.to_string(),
        data_dir: None,
        arg0: OsString::from(tool),
        args: args.to_vec(),
    }
}

/// Base name of `argv[0]`.
pub fn invoked_as(argv: &[OsString]) -> &OsStr {
    argv.first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .unwrap_or_default()
}

// Role binaries parse their own flags; the launcher only needs `--data-dir` to know where
// to stage. The last occurrence wins and `--` ends the scan.
fn scan_data_dir(args: &[OsString]) -> Option<PathBuf> {
    let mut found = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let Some(arg) = arg.to_str() else {
            continue;
        };
        match arg {
            "--" => break,
            "--data-dir" | "-d" => found = iter.next().map(PathBuf::from),
            _ => {
                if let Some(value) = arg
                    .strip_prefix("--data-dir=")
                    .or_else(|| arg.strip_prefix("-d="))
                {
                    found = Some(PathBuf::from(value));
                }
            }
        }
    }
    found
}
