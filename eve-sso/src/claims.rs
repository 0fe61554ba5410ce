//! Character identity extracted from a verified access token.
//!
//! The verified payload arrives as an untyped JSON object. It is read one
//! field at a time; a missing or mistyped field fails with an error naming
//! the claim.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, SsoError};

/// Identity asserted by a verified SSO access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterIdentity {
    character_id: i64,
    character_name: String,
    expires_at: DateTime<Utc>,
    scopes: Vec<String>,
    owner_hash: Option<String>,
}

impl CharacterIdentity {
    /// Decode an identity from verified claims.
    ///
    /// Only call this with claims whose signature has been checked.
    pub(crate) fn from_claims(claims: &Map<String, Value>) -> Result<Self> {
        let claims = ClaimSet(claims);

        let character_id = parse_character_id(claims.string("sub")?)?;
        let character_name = claims.string("name")?.to_string();
        let expires_at = claims.timestamp("exp")?;
        let scopes = claims.string_list("scp")?;
        let owner_hash = claims.optional_string("owner")?.map(str::to_string);

        Ok(Self { character_id, character_name, expires_at, scopes, owner_hash })
    }

    pub fn character_id(&self) -> i64 {
        self.character_id
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    /// When the access token stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Scopes granted to the token (`scp` claim).
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Hash identifying the account owning the character (`owner` claim).
    ///
    /// Changes when the character is transferred to another account.
    pub fn owner_hash(&self) -> Option<&str> {
        self.owner_hash.as_deref()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Parse the character id out of a subject like `CHARACTER:EVE:95465499`.
pub fn parse_character_id(subject: &str) -> Result<i64> {
    let parts: Vec<&str> = subject.splitn(3, ':').collect();
    let [_, _, id] = parts.as_slice() else {
        return Err(SsoError::invalid_claim(
            "sub",
            format!("expected '<issuer>:<kind>:<id>', got '{}'", subject),
        ));
    };
    id.parse::<i64>()
        .map_err(|e| SsoError::invalid_claim("sub", format!("character id '{}': {}", id, e)))
}

struct ClaimSet<'a>(&'a Map<String, Value>);

impl<'a> ClaimSet<'a> {
    fn required(&self, name: &'static str) -> Result<&'a Value> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(SsoError::MissingClaim(name)),
            Some(value) => Ok(value),
        }
    }

    fn string(&self, name: &'static str) -> Result<&'a str> {
        let value = self.required(name)?;
        value
            .as_str()
            .ok_or_else(|| {
                SsoError::invalid_claim(name, format!("expected a string, got {}", kind(value)))
            })
    }

    fn optional_string(&self, name: &'static str) -> Result<Option<&'a str>> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.string(name).map(Some),
        }
    }

    /// A string or an array of strings; absent means empty.
    fn string_list(&self, name: &'static str) -> Result<Vec<String>> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        SsoError::invalid_claim(
                            name,
                            format!("expected an array of strings, found {}", kind(item)),
                        )
                    })
                })
                .collect(),
            Some(other) => Err(SsoError::invalid_claim(
                name,
                format!("expected a string or array, got {}", kind(other)),
            )),
        }
    }

    /// Seconds since the epoch; fractional parts are truncated.
    fn timestamp(&self, name: &'static str) -> Result<DateTime<Utc>> {
        let value = self.required(name)?;
        let Value::Number(number) = value else {
            return Err(SsoError::invalid_claim(
                name,
                format!("expected a number, got {}", kind(value)),
            ));
        };

        let seconds = match number.as_i64() {
            Some(seconds) => seconds,
            None => {
                let float = number.as_f64().unwrap_or(f64::NAN);
                if !float.is_finite() || float.abs() >= i64::MAX as f64 {
                    return Err(SsoError::invalid_claim(
                        name,
                        format!("{} is out of range", number),
                    ));
                }
                float.trunc() as i64
            }
        };

        DateTime::<Utc>::from_timestamp(seconds, 0)
            .ok_or_else(|| SsoError::invalid_claim(name, format!("{} is out of range", seconds)))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
