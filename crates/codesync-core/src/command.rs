//! Transfer command construction
//!
//! A [`TransferCommand`] is built once per session and describes the rsync
//! invocation. Every run asks it for a fresh [`Invocation`]; nothing here
//! executes anything.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::exclusion::Exclusions;
use crate::target::SyncTarget;

/// Transfer executable used unless overridden
pub const DEFAULT_PROGRAM: &str = "rsync";
/// Remote shell rsync tunnels through
pub const REMOTE_SHELL: &str = "ssh";
/// archive, verbose, update, compress
pub const TRANSFER_FLAGS: &str = "avuz";

/// One concrete, ready-to-spawn process description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Build a tokio command with piped output and no stdin.
    ///
    /// `kill_on_drop` guarantees the child does not outlive its owner even
    /// if the owning task is torn down without an explicit termination.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Reusable rsync invocation for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    program: OsString,
    leading_args: Vec<OsString>,
    shell: String,
    flags: String,
    delete: bool,
    source: PathBuf,
    destination: String,
    exclusions: Exclusions,
}

impl TransferCommand {
    /// Describe the transfer for `target`.
    ///
    /// Exclusions are captured here and never re-read for later runs.
    pub fn build(target: &SyncTarget, exclusions: Exclusions) -> Self {
        Self {
            program: OsString::from(DEFAULT_PROGRAM),
            leading_args: Vec::new(),
            shell: REMOTE_SHELL.to_string(),
            flags: TRANSFER_FLAGS.to_string(),
            delete: true,
            source: target.source().to_path_buf(),
            destination: target.destination().to_string(),
            exclusions,
        }
    }

    /// Replace the transfer executable.
    ///
    /// `leading_args` are placed before the rsync arguments, which lets a
    /// wrapper (`nice`, a container exec, a shell) front the real tool.
    pub fn with_program<I, S>(mut self, program: impl Into<OsString>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program = program.into();
        self.leading_args = leading_args.into_iter().map(Into::into).collect();
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    /// rsync arguments, in the order rsync receives them:
    /// flags, options, exclusion source, per-folder exclusions, source, destination.
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(6 + self.exclusions.folders().len());

        args.push(OsString::from(format!("-{}", self.flags)));
        args.push(OsString::from(format!("--rsh={}", self.shell)));
        if self.delete {
            args.push(OsString::from("--delete"));
        }

        if let Some(ignore_file) = self.exclusions.ignore_file() {
            let mut arg = OsString::from("--exclude-from=");
            arg.push(ignore_file);
            args.push(arg);
        }
        for folder in self.exclusions.folders() {
            args.push(OsString::from(format!("--exclude={}", folder)));
        }

        args.push(self.source.clone().into_os_string());
        args.push(OsString::from(&self.destination));
        args
    }

    /// A fresh invocation, independent of any previously issued one
    pub fn invocation(&self) -> Invocation {
        let args = self
            .leading_args
            .iter()
            .cloned()
            .chain(self.args());
        Invocation::new(self.program.clone(), args)
    }
}

impl fmt::Display for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.invocation(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::IGNORE_FILE_NAME;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn target(temp: &TempDir, folders: &[&str]) -> SyncTarget {
        SyncTarget::resolve(
            temp.path(),
            ".",
            "user@host:/srv/app",
            folders.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    fn build(target: &SyncTarget) -> TransferCommand {
        let exclusions = Exclusions::resolve(target.source(), target.ignore_folders());
        TransferCommand::build(target, exclusions)
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_args_without_exclusions() {
        let temp = TempDir::new().unwrap();
        let target = target(&temp, &[]);

        let args = strings(&build(&target).args());

        assert_eq!(
            args,
            vec![
                "-avuz".to_string(),
                "--rsh=ssh".to_string(),
                "--delete".to_string(),
                target.source().display().to_string(),
                "user@host:/srv/app".to_string(),
            ]
        );
    }

    #[test]
    fn test_args_with_ignore_file_and_folders() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(IGNORE_FILE_NAME), "*.log\n").unwrap();
        let target = target(&temp, &["node_modules", "dist"]);

        let args = strings(&build(&target).args());

        let ignore_file = target.source().join(IGNORE_FILE_NAME);
        assert_eq!(args[3], format!("--exclude-from={}", ignore_file.display()));
        assert_eq!(args[4], "--exclude=node_modules");
        assert_eq!(args[5], "--exclude=dist");
        assert_eq!(args.len(), 8);
    }

    #[test]
    fn test_invocation_is_repeatable() {
        let temp = TempDir::new().unwrap();
        let target = target(&temp, &["tmp"]);
        let command = build(&target);

        let first = command.invocation();
        let second = command.invocation();

        assert_eq!(first, second);
        assert_eq!(first.program(), OsStr::new("rsync"));
    }

    #[test]
    fn test_exclusions_fixed_at_build_time() {
        let temp = TempDir::new().unwrap();
        let target = target(&temp, &[]);
        let command = build(&target);

        // Appears after the command was built; must not be picked up
        std::fs::write(temp.path().join(IGNORE_FILE_NAME), "*.log\n").unwrap();

        let args = strings(&command.args());
        assert!(!args.iter().any(|a| a.starts_with("--exclude-from=")));
    }

    #[test]
    fn test_with_program_prepends_leading_args() {
        let temp = TempDir::new().unwrap();
        let target = target(&temp, &[]);
        let command = build(&target).with_program("nice", ["-n", "10", "rsync"]);

        let invocation = command.invocation();

        assert_eq!(invocation.program(), OsStr::new("nice"));
        let args = strings(invocation.args());
        assert_eq!(&args[..4], &["-n", "10", "rsync", "-avuz"]);
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let invocation = Invocation::new("rsync", ["-avuz", "/tmp/my project", "host:/app"]);

        assert_eq!(
            invocation.to_string(),
            "rsync -avuz '/tmp/my project' host:/app"
        );
    }
}
