use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. The password hash never reaches clients.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: String,
    pub role: Option<String>,
    pub roll: Option<String>,
    pub gender: String,
    pub address: String,
    pub joined_on: String,
    pub failed_login_attempts: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub lock_until: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Projection used by login: credentials plus lockout state only.
#[derive(Debug, Clone, FromRow)]
pub struct LoginState {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub failed_login_attempts: i32,
    pub lock_until: Option<OffsetDateTime>,
}

/// Projection used by the forgot-password flow.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordOwner {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Lockout counters returned by the atomic failed-attempt update.
#[derive(Debug, Clone, FromRow)]
pub struct LockoutState {
    pub failed_login_attempts: i32,
    pub lock_until: Option<OffsetDateTime>,
}

#[cfg(test)]
impl User {
    pub fn sample() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Abdul Karim".into(),
            email: "karim@example.com".into(),
            password_hash: "$argon2id$fake".into(),
            phone: "01712345678".into(),
            role: Some("student".into()),
            roll: Some("42".into()),
            gender: "male".into(),
            address: "12 Lake Road, Dhaka".into(),
            joined_on: "2024-01-15".into(),
            failed_login_attempts: 0,
            lock_until: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_never_serialized() {
        let json = serde_json::to_value(User::sample()).expect("serialize");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "karim@example.com");
        assert_eq!(json["joinedOn"], "2024-01-15");
    }

    #[test]
    fn lock_until_serializes_as_rfc3339() {
        let mut user = User::sample();
        user.lock_until = Some(OffsetDateTime::UNIX_EPOCH);
        let json = serde_json::to_value(user).expect("serialize");
        assert_eq!(json["lockUntil"], "1970-01-01T00:00:00Z");
    }
}
