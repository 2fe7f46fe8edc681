use std::path::Path;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::error::{AppError, Result};

/// Claims identifying the provisioning service's GitHub App.
#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// Sign a short-lived RS256 JWT for the GitHub App.
///
/// First half of dispatch authentication: the JWT is exchanged for an
/// installation token scoped to the automation repositories. The key is read
/// per token refresh rather than held in memory, so a failure here is a
/// dispatch failure, not a startup one.
pub fn generate_app_jwt(app_id: u64, private_key_path: &Path) -> Result<String> {
    let key_pem = std::fs::read(private_key_path).map_err(|e| {
        AppError::Dispatch(format!(
            "Failed to read GitHub App key at {}: {e}",
            private_key_path.display()
        ))
    })?;

    let key = EncodingKey::from_rsa_pem(&key_pem)
        .map_err(|e| AppError::Dispatch(format!("Invalid GitHub App key: {e}")))?;

    let now = chrono::Utc::now().timestamp();
    let claims = AppClaims {
        // issued slightly in the past to tolerate clock drift against GitHub
        iat: now - 60,
        // GitHub caps App JWTs at ten minutes
        exp: now + 10 * 60,
        iss: app_id.to_string(),
    };

    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| AppError::Dispatch(format!("Failed to sign GitHub App JWT: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_key_is_a_dispatch_error() {
        let err = generate_app_jwt(1, Path::new("/definitely/not/here.pem")).unwrap_err();
        assert!(matches!(err, AppError::Dispatch(_)));
    }

    #[test]
    fn test_non_pem_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.pem");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"not a key").unwrap();

        let err = generate_app_jwt(1, &path).unwrap_err();
        assert!(matches!(err, AppError::Dispatch(_)));
    }
}
