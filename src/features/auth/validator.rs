use super::model::{AppMetadata, AuthenticatedUser, Role};
use crate::core::config::AuthConfig;
use crate::core::error::AppError;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

/// Validates HS256 access tokens minted by the hosted auth provider.
pub struct JwtValidator {
    decoding_key: DecodingKey,
    audience: String,
    leeway: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(rename = "exp")]
    _exp: u64,
    #[serde(default)]
    app_metadata: AppMetadata,
}

impl JwtValidator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            audience: config.audience.clone(),
            leeway: config.jwt_leeway.as_secs(),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let header = decode_header(token).map_err(|e| AppError::Auth(e.to_string()))?;
        if header.alg != Algorithm::HS256 {
            return Err(AppError::Auth(format!(
                "Unsupported algorithm: {:?}. Only HS256 is allowed",
                header.alg
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Auth(e.to_string()))?
            .claims;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Auth("Token subject is not a user id".to_string()))?;

        // Accounts without an explicit role are citizens
        let role = match claims.app_metadata.role.as_deref() {
            Some(raw) => raw.parse::<Role>().map_err(AppError::Auth)?,
            None => Role::Citizen,
        };

        let session_id = claims
            .session_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| user_id.to_string());

        Ok(AuthenticatedUser {
            user_id,
            email: claims.email,
            session_id,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::{mint_token, test_auth_config, TokenSpec};

    #[test]
    fn accepts_provider_token() {
        let config = test_auth_config();
        let validator = JwtValidator::new(&config);
        let user_id = Uuid::new_v4();
        let token = mint_token(&config, &TokenSpec::new(user_id, Role::Admin).session("s-1"));

        let user = validator.validate_token(&token).unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.session_id, "s-1");
    }

    #[test]
    fn missing_role_means_citizen() {
        let config = test_auth_config();
        let validator = JwtValidator::new(&config);
        let token = mint_token(&config, &TokenSpec::new(Uuid::new_v4(), Role::Citizen).no_role());

        let user = validator.validate_token(&token).unwrap();
        assert_eq!(user.role, Role::Citizen);
        assert_eq!(user.session_id, user.user_id.to_string());
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let config = test_auth_config();
        let validator = JwtValidator::new(&config);

        let mut other = config.clone();
        other.jwt_secret = "another-secret-another-secret-!!".to_string();
        let forged = mint_token(&other, &TokenSpec::new(Uuid::new_v4(), Role::SuperAdmin));
        assert!(matches!(
            validator.validate_token(&forged),
            Err(AppError::Auth(_))
        ));

        let expired = mint_token(
            &config,
            &TokenSpec::new(Uuid::new_v4(), Role::Citizen).expires_in(-3600),
        );
        assert!(validator.validate_token(&expired).is_err());
    }

    #[test]
    fn rejects_wrong_audience() {
        let config = test_auth_config();
        let validator = JwtValidator::new(&config);
        let mut other = config.clone();
        other.audience = "service_role".to_string();
        let token = mint_token(&other, &TokenSpec::new(Uuid::new_v4(), Role::Citizen));
        assert!(validator.validate_token(&token).is_err());
    }
}
