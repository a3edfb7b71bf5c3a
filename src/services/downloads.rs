//! Download authorization for generated images.
//!
//! Download links embed the requesting key as a query parameter so the full
//! URL can be pasted anywhere. Authorizing a fetch checks two independent
//! things: the filename must resolve inside the generated-images root, and
//! the presented key must be active. The traversal verdict is computed
//! regardless of key validity and takes precedence, so a traversal attempt
//! is reported as such even with a garbage key.
//!
//! Any active key may fetch any existing file; there is no binding between
//! the key that generated an image and the key used to download it.

use crate::error::AppError;
use crate::models::api_key::KeyRole;
use crate::store::KeyStore;
use std::path::{Component, Path, PathBuf};

/// Build the download URL for a generated image, bound to the key that
/// requested the generation.
///
/// # Format
///
/// `{base_url}/downloads/{filename}?api_key={key}`
pub fn build_download_url(base_url: &str, filename: &str, api_key: &str) -> Result<String, AppError> {
    let mut url = url::Url::parse(base_url)
        .map_err(|_| AppError::InvalidRequest(format!("Invalid base URL: {base_url}")))?;

    url.path_segments_mut()
        .map_err(|_| AppError::InvalidRequest(format!("Invalid base URL: {base_url}")))?
        .pop_if_empty()
        .push("downloads")
        .push(filename);
    url.query_pairs_mut().append_pair("api_key", api_key);

    Ok(url.into())
}

/// Authorize a download request and resolve the file path.
///
/// # Checks (in reporting order)
///
/// 1. **Containment**: the filename must stay lexically inside the
///    artifacts root (no parent, root, or prefix components). Checked
///    before touching the filesystem at all.
/// 2. **Key**: the presented key must be active at the client tier.
/// 3. **Existence**: the resolved file must exist under the root; the
///    canonicalized path is re-verified against the canonicalized root so a
///    symlink cannot smuggle the read outside it.
///
/// # Errors
///
/// - `InvalidFilePath`: filename escapes the root (wins over a bad key)
/// - `MissingApiKey` / `InvalidApiKey`: no key, or not an active one
/// - `ImageNotFound`: contained, authorized, but no such file
pub fn authorize_download(
    keys: &KeyStore,
    images_root: &Path,
    filename: &str,
    presented_key: Option<&str>,
) -> Result<PathBuf, AppError> {
    // Both failure classes are evaluated; escape is reported first
    let escapes = path_escapes(filename);
    let key_ok = presented_key
        .map(|key| keys.validate_key(key, KeyRole::Client))
        .unwrap_or(false);

    if escapes {
        return Err(AppError::InvalidFilePath);
    }
    if !key_ok {
        return match presented_key {
            None => Err(AppError::MissingApiKey),
            Some(_) => Err(AppError::InvalidApiKey),
        };
    }

    let filepath = images_root.join(filename);
    if !filepath.is_file() {
        return Err(AppError::ImageNotFound);
    }

    // The lexical check above cannot see symlinks; compare real paths too
    let root_real = images_root.canonicalize()?;
    let file_real = filepath.canonicalize()?;
    if !file_real.starts_with(&root_real) {
        return Err(AppError::InvalidFilePath);
    }

    Ok(file_real)
}

/// Lexical containment check: does `filename` point outside the root?
fn path_escapes(filename: &str) -> bool {
    if filename.is_empty() {
        return true;
    }

    Path::new(filename)
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const ADMIN: &str = "download-admin-key";

    struct Fixture {
        _dir: tempfile::TempDir,
        keys: KeyStore,
        images_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let keys = KeyStore::open(dir.path().join("api_keys.json"), ADMIN).unwrap();
        let images_root = dir.path().join("generated_images");
        fs::create_dir_all(&images_root).unwrap();
        fs::write(images_root.join("existing.png"), b"png bytes").unwrap();
        Fixture {
            _dir: dir,
            keys,
            images_root,
        }
    }

    #[test]
    fn traversal_fails_regardless_of_key_validity() {
        let f = fixture();
        let valid = f.keys.create_key().unwrap().key;

        for key in [Some(valid.as_str()), Some("bogus"), None] {
            let err =
                authorize_download(&f.keys, &f.images_root, "../../etc/passwd", key).unwrap_err();
            assert!(matches!(err, AppError::InvalidFilePath), "key case: {key:?}");
        }
    }

    #[test]
    fn absolute_paths_are_rejected() {
        let f = fixture();
        let valid = f.keys.create_key().unwrap().key;

        let err = authorize_download(&f.keys, &f.images_root, "/etc/passwd", Some(&valid))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidFilePath));
    }

    #[test]
    fn revoked_key_fails_regardless_of_filename() {
        let f = fixture();
        let key = f.keys.create_key().unwrap().key;
        f.keys.revoke_key(&key).unwrap();

        for filename in ["existing.png", "missing.png"] {
            let err =
                authorize_download(&f.keys, &f.images_root, filename, Some(&key)).unwrap_err();
            assert!(matches!(err, AppError::InvalidApiKey), "file case: {filename}");
        }
    }

    #[test]
    fn missing_key_is_reported_as_missing() {
        let f = fixture();

        let err = authorize_download(&f.keys, &f.images_root, "existing.png", None).unwrap_err();
        assert!(matches!(err, AppError::MissingApiKey));
    }

    #[test]
    fn active_key_fetches_existing_file() {
        let f = fixture();
        let key = f.keys.create_key().unwrap().key;

        let path =
            authorize_download(&f.keys, &f.images_root, "existing.png", Some(&key)).unwrap();
        assert!(path.ends_with("existing.png"));
        assert!(path.is_file());
    }

    #[test]
    fn admin_key_may_download_too() {
        let f = fixture();

        let path =
            authorize_download(&f.keys, &f.images_root, "existing.png", Some(ADMIN)).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn any_active_key_fetches_any_file() {
        // No ownership binding between creator and downloader
        let f = fixture();
        let other = f.keys.create_key().unwrap().key;

        assert!(authorize_download(&f.keys, &f.images_root, "existing.png", Some(&other)).is_ok());
    }

    #[test]
    fn contained_but_missing_file_is_not_found() {
        let f = fixture();
        let key = f.keys.create_key().unwrap().key;

        let err =
            authorize_download(&f.keys, &f.images_root, "missing.png", Some(&key)).unwrap_err();
        assert!(matches!(err, AppError::ImageNotFound));
    }

    #[test]
    fn download_url_embeds_the_key() {
        let url =
            build_download_url("http://localhost:8000", "abc.png", "secret-key").unwrap();
        assert_eq!(url, "http://localhost:8000/downloads/abc.png?api_key=secret-key");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let f = fixture();
        let key = f.keys.create_key().unwrap().key;

        let outside = f.images_root.parent().unwrap().join("outside.txt");
        fs::write(&outside, b"secret").unwrap();
        std::os::unix::fs::symlink(&outside, f.images_root.join("sneaky.png")).unwrap();

        let err =
            authorize_download(&f.keys, &f.images_root, "sneaky.png", Some(&key)).unwrap_err();
        assert!(matches!(err, AppError::InvalidFilePath));
    }
}
