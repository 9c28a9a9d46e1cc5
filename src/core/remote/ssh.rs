use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, UNIX_EPOCH};

use log::debug;

use super::{check_date_prefix, pick_oldest, RemoteArtifact, RemoteStore};
use crate::core::config::RemoteConfig;
use crate::core::error::TransportError;

/// Remote store reached over ssh/scp.
///
/// Every call runs one non-interactive command (`BatchMode=yes`), so key
/// based authentication must already be set up for `host`.
#[derive(Debug, Clone)]
pub struct SshRemote {
    host: String,
    base_path: PathBuf,
    ssh_program: String,
    scp_program: String,
    connect_timeout: Option<u64>,
}

impl SshRemote {
    pub fn new(host: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            base_path: base_path.into(),
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            connect_timeout: None,
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            host: config.host.clone(),
            base_path: config.base_path.clone(),
            ssh_program: config.ssh_program.clone(),
            scp_program: config.scp_program.clone(),
            connect_timeout: config.connect_timeout_secs,
        }
    }

    fn common_options(&self) -> Vec<String> {
        let mut opts = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(secs) = self.connect_timeout {
            opts.push("-o".to_string());
            opts.push(format!("ConnectTimeout={}", secs));
        }
        opts
    }

    pub(crate) fn ssh_args(&self, remote_command: &str) -> Vec<String> {
        let mut args = self.common_options();
        args.push(self.host.clone());
        args.push(format!(
            "cd {} && {}",
            shell_quote(&self.base_path.to_string_lossy()),
            remote_command
        ));
        args
    }

    pub(crate) fn scp_args(&self, local: &Path, remote_name: &str) -> Vec<String> {
        let mut args = vec!["-q".to_string()];
        args.extend(self.common_options());
        args.push(local.to_string_lossy().into_owned());
        args.push(format!(
            "{}:{}",
            self.host,
            self.base_path.join(remote_name).to_string_lossy()
        ));
        args
    }

    fn run(program: &str, args: &[String]) -> Result<Output, TransportError> {
        debug!("🔐 {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| TransportError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(TransportError::CommandFailed {
                program: program.to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl RemoteStore for SshRemote {
    fn upload(&self, local: &Path, remote_name: &str) -> Result<(), TransportError> {
        Self::run(&self.scp_program, &self.scp_args(local, remote_name))?;
        Ok(())
    }

    fn oldest_artifact(&self) -> Result<Option<RemoteArtifact>, TransportError> {
        let output = Self::run(
            &self.ssh_program,
            &self.ssh_args("find . -maxdepth 1 -type f -name '*.jpg' -printf '%T@ %f\\n'"),
        )?;
        let listing = parse_listing(&String::from_utf8_lossy(&output.stdout))?;
        Ok(pick_oldest(listing))
    }

    fn delete_date(&self, date_prefix: &str) -> Result<usize, TransportError> {
        check_date_prefix(date_prefix)?;
        let output = Self::run(
            &self.ssh_program,
            &self.ssh_args(&format!(
                "find . -maxdepth 1 -type f -name '{}*' -print -delete",
                date_prefix
            )),
        )?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count())
    }
}

/// Parse `find -printf '%T@ %f\n'` output: epoch seconds, a space, the name.
pub fn parse_listing(stdout: &str) -> Result<Vec<RemoteArtifact>, TransportError> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let malformed = || TransportError::MalformedListing(line.to_string());
            let (stamp, name) = line.split_once(' ').ok_or_else(malformed)?;
            let secs: f64 = stamp.parse().map_err(|_| malformed())?;
            if !secs.is_finite() || secs < 0.0 || name.is_empty() {
                return Err(malformed());
            }
            let modified = Duration::try_from_secs_f64(secs)
                .ok()
                .and_then(|age| UNIX_EPOCH.checked_add(age))
                .ok_or_else(malformed)?;
            Ok(RemoteArtifact {
                name: name.to_string(),
                modified,
            })
        })
        .collect()
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing() {
        let listing = parse_listing(
            "1704153600.2500000000 20240102-000000.0000.jpg\n\
             1704067200.0000000000 20240101-000000.0000.jpg\n\n",
        )
        .unwrap();

        assert_eq!(listing.len(), 2);
        let oldest = pick_oldest(listing).unwrap();
        assert_eq!(oldest.name, "20240101-000000.0000.jpg");
        assert_eq!(oldest.modified, UNIX_EPOCH + Duration::from_secs(1_704_067_200));
    }

    #[test]
    fn test_parse_listing_rejects_noise() {
        assert!(matches!(
            parse_listing("Permission denied\n"),
            Err(TransportError::MalformedListing(_))
        ));
        assert!(parse_listing("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_listing_rejects_out_of_range_timestamp() {
        for line in ["1e30 20240101-000000.0000.jpg\n", "inf 20240101-000000.0000.jpg\n"] {
            assert!(matches!(
                parse_listing(line),
                Err(TransportError::MalformedListing(_))
            ));
        }
    }

    #[test]
    fn test_ssh_args_quote_base_path() {
        let mut remote = SshRemote::new("cam@nas", "/srv/it's here");
        remote.connect_timeout = Some(5);
        let args = remote.ssh_args("true");

        assert_eq!(
            args,
            vec![
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=5",
                "cam@nas",
                r"cd '/srv/it'\''s here' && true",
            ]
        );
    }

    #[test]
    fn test_scp_args_target_remote_name() {
        let remote = SshRemote::new("cam@nas", "/home/seguridad/lq");
        let args = remote.scp_args(Path::new("temp/a.jpg"), "a.jpg");
        assert_eq!(args.first().map(String::as_str), Some("-q"));
        assert_eq!(args.last().unwrap(), "cam@nas:/home/seguridad/lq/a.jpg");
    }

    #[test]
    fn test_delete_refuses_bad_prefix_before_connecting() {
        let remote = SshRemote::new("cam@nas", "/lq");
        assert!(matches!(
            remote.delete_date("*"),
            Err(TransportError::InvalidPrefix(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_program_is_spawn_error() {
        let mut remote = SshRemote::new("cam@nas", "/lq");
        remote.ssh_program = "/nonexistent/ssh".to_string();
        assert!(matches!(
            remote.oldest_artifact(),
            Err(TransportError::Spawn { .. })
        ));
    }
}
