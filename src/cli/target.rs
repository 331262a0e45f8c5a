//! Runtime targets and fingerprint stores built from CLI arguments.

use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::admin::AdminClient;
use crate::delivery::{RuntimeTarget, TargetMode};
use crate::error::{Result, ResultExt};
use crate::state::{LocalFingerprintStore, STATE_DIR, STATE_FILE};

use super::commands::{ModeArg, TargetArgs};

/// Builds the admin client for one URL, with the configured headers.
///
/// # Errors
///
/// Returns an error if a header is malformed or the client cannot be built.
pub fn admin_client(args: &TargetArgs, url: &str) -> Result<AdminClient> {
    let mut client = AdminClient::with_timeout(url, args.timeout_secs)?;
    for (name, value) in args.headers()? {
        client = client.with_header(&name, &value)?;
    }
    Ok(client)
}

/// Connects to one target, discovering its version and, in `auto` mode,
/// its delivery mode.
///
/// # Errors
///
/// Returns an error if the target's root endpoint cannot be read.
pub async fn connect(args: &TargetArgs, url: &str) -> Result<RuntimeTarget> {
    let client = admin_client(args, url)?;
    let mut target = RuntimeTarget::discover(client).await?;

    match args.mode {
        ModeArg::Auto => {}
        ModeArg::Direct => target.mode = TargetMode::DirectApply,
        ModeArg::Reconciled => target.mode = TargetMode::ReconciledApply,
    }
    debug!("Using {:?} for {url}", target.mode);

    Ok(target
        .with_concurrency(args.concurrency)
        .with_skip_ca_certificates(args.skip_ca_certificates))
}

/// Connects to every configured target.
///
/// # Errors
///
/// Returns the first connection failure.
pub async fn connect_all(args: &TargetArgs) -> Result<Vec<RuntimeTarget>> {
    try_join_all(args.admin_urls.iter().map(|url| async move {
        connect(args, url)
            .await
            .context(format!("connecting to {url}"))
    }))
    .await
}

/// Returns the fingerprint store for one target.
///
/// With a single target the file is `fingerprint.json`; with several, each
/// target gets a file named after its address.
///
/// # Errors
///
/// Returns an error if no state directory was given and the current
/// directory cannot be determined.
pub fn fingerprint_store(
    state_dir: Option<&Path>,
    url: &str,
    multiple_targets: bool,
) -> Result<LocalFingerprintStore> {
    let dir = match state_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?.join(STATE_DIR),
    };
    Ok(LocalFingerprintStore::with_state_path(
        dir.join(state_file_name(url, multiple_targets)),
    ))
}

fn state_file_name(url: &str, multiple_targets: bool) -> PathBuf {
    if !multiple_targets {
        return PathBuf::from(STATE_FILE);
    }
    let address = url.split_once("://").map_or(url, |(_, rest)| rest);
    let slug: String = address
        .trim_end_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    PathBuf::from(format!("fingerprint-{slug}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_names() {
        assert_eq!(
            state_file_name("http://kong:8001", false),
            PathBuf::from("fingerprint.json")
        );
        assert_eq!(
            state_file_name("https://kong-b.internal:8444/", true),
            PathBuf::from("fingerprint-kong-b-internal-8444.json")
        );
    }

    #[test]
    fn test_store_in_state_dir() {
        let store =
            fingerprint_store(Some(Path::new("/var/lib/gwpush")), "http://kong:8001", false)
                .expect("store");
        assert_eq!(
            store.state_path(),
            Path::new("/var/lib/gwpush/fingerprint.json")
        );
    }
}
