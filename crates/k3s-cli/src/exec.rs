use k3s_data::Environment;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;

/// A fully resolved process replacement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecRequest {
    pub program: PathBuf,
    /// Passed as `argv[0]`; role binaries pick their behaviour from it.
    pub arg0: OsString,
    pub args: Vec<OsString>,
    /// The complete environment of the new image.
    pub env: Environment,
}

impl ExecRequest {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).env_clear().envs(self.env.iter());
        command
    }

    /// Replaces the current process image. Returns only if the exec failed.
    #[cfg(unix)]
    pub fn exec(self) -> io::Error {
        use std::os::unix::process::CommandExt;

        let mut command = self.command();
        command.arg0(&self.arg0);
        command.exec()
    }

    /// Runs the program to completion and exits with its status.
    #[cfg(not(unix))]
    pub fn exec(self) -> io::Error {
        match self.command().status() {
            Ok(status) => std::process::exit(status.code().unwrap_or(1)),
            Err(err) => err,
        }
    }
}
