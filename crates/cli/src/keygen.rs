use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::SigningKey;

use crate::fail;

/// Generate a result-signing keypair and write it to files.
///
/// Writes `<prefix>.secret` (base64 of the 32-byte Ed25519 seed) and
/// `<prefix>.pub` (base64 of the verifying key). The secret file is made
/// owner-only on Unix.
pub fn cmd_keygen(algorithm: &str, output_prefix: &str) {
    if algorithm != notary_checker::signing::ED25519 {
        fail(format!(
            "unsupported algorithm '{}'; only 'ed25519' is supported",
            algorithm
        ));
    }

    let mut rng = rand::rngs::OsRng;
    let signing_key = SigningKey::generate(&mut rng);
    let (secret_path, pub_path) = write_keypair(&signing_key, output_prefix)
        .unwrap_or_else(|e| fail(e));

    println!("Generated Ed25519 keypair: {}, {}", secret_path, pub_path);
}

fn write_keypair(signing_key: &SigningKey, output_prefix: &str) -> Result<(String, String), String> {
    let secret_path = format!("{}.secret", output_prefix);
    std::fs::write(&secret_path, BASE64.encode(signing_key.to_bytes()))
        .map_err(|e| format!("error writing secret key to '{}': {}", secret_path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        if let Err(e) = std::fs::set_permissions(&secret_path, perms) {
            tracing::warn!(path = %secret_path, error = %e, "failed to restrict secret key permissions");
        }
    }

    let pub_path = format!("{}.pub", output_prefix);
    std::fs::write(&pub_path, BASE64.encode(signing_key.verifying_key().to_bytes()))
        .map_err(|e| format!("error writing public key to '{}': {}", pub_path, e))?;

    Ok((secret_path, pub_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notary_checker::Ed25519ResultSigner;
    use tempfile::TempDir;

    #[test]
    fn written_keypair_loads_as_signer() {
        let tmp = TempDir::new().unwrap();
        let prefix = tmp.path().join("notary");
        let key = SigningKey::generate(&mut rand::rngs::OsRng);

        let (secret_path, pub_path) = write_keypair(&key, prefix.to_str().unwrap()).unwrap();

        let signer = Ed25519ResultSigner::from_secret_file(std::path::Path::new(&secret_path)).unwrap();
        assert_eq!(signer.verifying_key(), key.verifying_key());
        assert_eq!(
            std::fs::read_to_string(&pub_path).unwrap(),
            signer.public_key_base64()
        );
    }

    #[cfg(unix)]
    #[test]
    fn secret_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let prefix = tmp.path().join("notary");
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        let (secret_path, _) = write_keypair(&key, prefix.to_str().unwrap()).unwrap();

        let mode = std::fs::metadata(&secret_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn unwritable_prefix_is_an_error() {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        assert!(write_keypair(&key, "/nonexistent-dir/notary").is_err());
    }
}
