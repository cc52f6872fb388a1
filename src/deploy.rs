//! Template deployment over SFTP.
//!
//! Uploads every materialized template to an existing remote directory,
//! creating sub-directories as needed. Uploads are per file: a failure
//! leaves the files already sent in place. There are no retries.

use crate::{
    compiler::collect_all_files,
    config::{BuildConfig, SftpDeployConfig, SiteConfig},
    log,
};
use anyhow::{Context, Result, bail};
use rustc_hash::FxHashSet;
use ssh2::{Session, Sftp};
use std::{
    env, fs, io,
    net::TcpStream,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Permissions for directories created on the remote side.
const REMOTE_DIR_MODE: i32 = 0o755;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeployError {
    #[error("no credentials: set [deploy.sftp.key_path] or the `{0}` environment variable")]
    MissingCredentials(String),

    #[error("remote path `{0}` does not exist or is not a directory")]
    RemotePathNotFound(String),

    #[error("no templates to deploy in `{0}`, run `inkpot compile` first")]
    NoTemplates(PathBuf),

    #[error("authentication as `{0}` failed")]
    AuthenticationFailed(String),
}

/// How to authenticate against the SSH server.
#[derive(Debug, PartialEq, Eq)]
pub enum Credentials {
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    Password(String),
}

/// Pick credentials: a key file when configured, else the password variable.
///
/// `lookup` reads environment variables; empty values count as unset.
pub fn resolve_credentials(
    sftp: &SftpDeployConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials, DeployError> {
    let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(path) = &sftp.key_path {
        return Ok(Credentials::KeyFile {
            path: path.clone(),
            passphrase: lookup(&sftp.passphrase_env),
        });
    }

    lookup(&sftp.password_env)
        .map(Credentials::Password)
        .ok_or_else(|| DeployError::MissingCredentials(sftp.password_env.clone()))
}

/// Materialized templates with their paths relative to the template directory.
pub fn collect_templates(build: &BuildConfig) -> Result<Vec<(PathBuf, PathBuf)>, DeployError> {
    let files = collect_all_files(&build.templates);
    if files.is_empty() {
        return Err(DeployError::NoTemplates(build.templates.clone()));
    }

    Ok(files
        .into_iter()
        .filter_map(|path| {
            let relative = path.strip_prefix(&build.templates).ok()?.to_path_buf();
            Some((path, relative))
        })
        .collect())
}

/// Join a relative local path onto a remote directory with `/` separators.
pub fn remote_join(remote_root: &str, relative: &Path) -> String {
    let mut remote = remote_root.trim_end_matches('/').to_owned();
    for component in relative.components() {
        remote.push('/');
        remote.push_str(&component.as_os_str().to_string_lossy());
    }
    remote
}

/// Remote directories to create before uploading, parents first.
fn remote_dirs(remote_root: &str, files: &[(PathBuf, PathBuf)]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut dirs = Vec::new();
    for (_, relative) in files {
        let Some(parent) = relative.parent() else { continue };
        let mut current = PathBuf::new();
        for component in parent.components() {
            current.push(component);
            let remote = remote_join(remote_root, &current);
            if seen.insert(remote.clone()) {
                dirs.push(remote);
            }
        }
    }
    dirs
}

/// Create the directories in `dirs` that `exists` does not report.
///
/// Returns how many were created. A failed `mkdir` aborts the deploy.
fn ensure_remote_dirs(
    dirs: &[String],
    exists: impl Fn(&str) -> bool,
    mut mkdir: impl FnMut(&str) -> Result<(), ssh2::Error>,
) -> Result<usize> {
    let mut created = 0;
    for dir in dirs.iter().filter(|dir| !exists(dir)) {
        mkdir(dir).with_context(|| format!("Failed to create remote directory {dir}"))?;
        created += 1;
    }
    Ok(created)
}

// ============================================================================
// Session
// ============================================================================

fn connect(sftp: &SftpDeployConfig, credentials: &Credentials) -> Result<Session> {
    let tcp = TcpStream::connect((sftp.host.as_str(), sftp.port))
        .with_context(|| format!("Failed to connect to {}:{}", sftp.host, sftp.port))?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake().context("SSH handshake failed")?;

    let auth = match credentials {
        Credentials::KeyFile { path, passphrase } => {
            session.userauth_pubkey_file(&sftp.user, None, path, passphrase.as_deref())
        }
        Credentials::Password(password) => session.userauth_password(&sftp.user, password),
    };
    if let Err(e) = auth {
        log!("deploy"; "{e}");
    }
    if !session.authenticated() {
        bail!(DeployError::AuthenticationFailed(sftp.user.clone()));
    }

    Ok(session)
}

fn upload(sftp: &Sftp, local: &Path, remote: &str) -> Result<()> {
    let mut source =
        fs::File::open(local).with_context(|| format!("Failed to open {}", local.display()))?;
    let mut target = sftp
        .create(Path::new(remote))
        .with_context(|| format!("Failed to create remote file {remote}"))?;
    io::copy(&mut source, &mut target).with_context(|| format!("Failed to upload {remote}"))?;
    Ok(())
}

// ============================================================================
// Public API
// ============================================================================

/// Deploy materialized templates to the configured SFTP target.
pub fn deploy_templates(config: &SiteConfig) -> Result<()> {
    let target = &config.deploy.sftp;
    let files = collect_templates(&config.build)?;
    let credentials = resolve_credentials(target, |name| env::var(name).ok())?;

    log!("deploy"; "connecting to {}@{}:{}", target.user, target.host, target.port);
    let session = connect(target, &credentials)?;
    let sftp = session.sftp().context("Failed to start SFTP subsystem")?;

    let is_dir = sftp
        .stat(Path::new(&target.remote_path))
        .is_ok_and(|stat| stat.is_dir());
    if !is_dir {
        bail!(DeployError::RemotePathNotFound(target.remote_path.clone()));
    }

    let created = ensure_remote_dirs(
        &remote_dirs(&target.remote_path, &files),
        |dir| sftp.stat(Path::new(dir)).is_ok_and(|stat| stat.is_dir()),
        |dir| sftp.mkdir(Path::new(dir), REMOTE_DIR_MODE),
    )?;
    if created > 0 {
        log!("deploy"; "created {created} remote directories");
    }

    for (local, relative) in &files {
        let remote = remote_join(&target.remote_path, relative);
        upload(&sftp, local, &remote)?;
        log!("deploy"; "{}", relative.display());
    }

    log!("deploy"; "uploaded {} templates to {}", files.len(), target.remote_path);
    Ok(())
}
