//! Persistent identity key loading (spec.md §6 `identity.*`), out of scope
//! for the session engine itself but required by the CLI entry points.

use std::path::Path;

use wais_transport::Identity;

/// Load the identity stored at `path`, or generate and persist a new one.
///
/// The file holds the identity as hex text. Permissions are restricted to
/// owner read/write where the platform supports it (spec.md §6 "0600
/// permissions RECOMMENDED").
///
/// # Errors
/// Returns an I/O error if the existing file is unreadable, malformed, or
/// if a freshly generated identity cannot be written.
pub fn load_or_create(path: &Path) -> std::io::Result<Identity> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Identity::from_hex(contents.trim())
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let identity = Identity::random();
            save(path, &identity)?;
            Ok(identity)
        }
        Err(err) => Err(err),
    }
}

fn save(path: &Path, identity: &Identity) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, identity.to_hex())?;
    restrict_permissions(path)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
