//! Email addresses of staff accounts and customers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a string was rejected as an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    #[error("email must look like name@domain")]
    Malformed,
    #[error("email cannot contain whitespace")]
    Whitespace,
}

/// An email address with exactly one `@` between a non-empty name and
/// domain. Accounts are looked up by the [`Email::normalized`] form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 limit.
    pub const MAX_LENGTH: usize = 254;

    /// Check `s` as-is.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] naming the first rule `s` breaks.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }
        match s.split_once('@') {
            Some((name, domain))
                if !name.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(s.to_owned()))
            }
            _ => Err(EmailError::Malformed),
        }
    }

    /// Trim and lowercase before checking, so `Jan@Shop.nl ` and
    /// `jan@shop.nl` are the same account.
    ///
    /// # Errors
    ///
    /// Same as [`Email::parse`].
    pub fn normalized(s: &str) -> Result<Self, EmailError> {
        Self::parse(&s.trim().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::normalized(&s)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "sqlite")]
impl sqlx::Type<sqlx::Sqlite> for Email {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

#[cfg(feature = "sqlite")]
impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections() {
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
        assert_eq!(Email::parse("klant"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("@shop.nl"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("klant@"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("klant@shop@nl"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("jan jansen@shop.nl"), Err(EmailError::Whitespace));

        let long = format!("{}@shop.nl", "a".repeat(250));
        assert!(matches!(Email::parse(&long), Err(EmailError::TooLong { max: 254 })));
    }

    #[test]
    fn test_normalized_lowercases_and_trims() {
        let email = Email::normalized("  Jan.Jansen+crm@Shop.NL ").unwrap();
        assert_eq!(email.as_str(), "jan.jansen+crm@shop.nl");
        assert_eq!(email.to_string(), "jan.jansen+crm@shop.nl");
    }

    #[test]
    fn test_deserialize_normalizes_and_validates() {
        let email: Email = serde_json::from_str("\" Piet@Example.NL\"").unwrap();
        assert_eq!(email.as_str(), "piet@example.nl");
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"piet@example.nl\"");

        assert!(serde_json::from_str::<Email>("\"geen-adres\"").is_err());
    }
}
