use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::dto::RegisterRequest;
use super::query::{ResolvedSearch, SEARCHABLE_FIELDS};
use super::repo_types::{LockoutState, LoginState, PasswordOwner, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, phone, role, roll, gender, address, \
     joined_on, failed_login_attempts, lock_until, created_at, updated_at";

impl User {
    pub async fn create(
        db: &PgPool,
        req: &RegisterRequest,
        password_hash: &str,
    ) -> sqlx::Result<User> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, phone, role, gender, address, joined_on)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&req.name)
            .bind(&req.email)
            .bind(password_hash)
            .bind(&req.phone)
            .bind(&req.role)
            .bind(&req.gender)
            .bind(&req.address)
            .bind(&req.joined_on)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_roll(db: &PgPool, roll: &str) -> sqlx::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE roll = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(roll)
            .fetch_optional(db)
            .await
    }

    /// Credentials and lockout state only; the full record is fetched
    /// separately after a successful password check.
    pub async fn login_state_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<LoginState>> {
        sqlx::query_as::<_, LoginState>(
            r#"
            SELECT id, email, password_hash, failed_login_attempts, lock_until
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn password_owner_by_email(
        db: &PgPool,
        email: &str,
    ) -> sqlx::Result<Option<PasswordOwner>> {
        sqlx::query_as::<_, PasswordOwner>(
            r#"
            SELECT id, email, name
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Increment-and-compare in a single statement: the lock timestamp is set
    /// by the same write that crosses the threshold, so concurrent mismatches
    /// cannot race past it.
    pub async fn record_failed_attempt(
        db: &PgPool,
        email: &str,
        max_attempts: i32,
        lock_minutes: i32,
    ) -> sqlx::Result<LockoutState> {
        sqlx::query_as::<_, LockoutState>(
            r#"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1,
                lock_until = CASE
                    WHEN failed_login_attempts + 1 >= $2
                        THEN now() + make_interval(mins => $3)
                    ELSE lock_until
                END,
                updated_at = now()
            WHERE email = $1
            RETURNING failed_login_attempts, lock_until
            "#,
        )
        .bind(email)
        .bind(max_attempts)
        .bind(lock_minutes)
        .fetch_one(db)
        .await
    }

    pub async fn clear_lockout(db: &PgPool, email: &str) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, lock_until = NULL, updated_at = now()
            WHERE email = $1
            "#,
        )
        .bind(email)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn set_password_hash(db: &PgPool, id: Uuid, password_hash: &str) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_role(db: &PgPool, id: Uuid, role: &str) -> sqlx::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(db)
            .await
    }

    pub async fn update_roll(db: &PgPool, id: Uuid, roll: &str) -> sqlx::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET roll = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(roll)
            .fetch_optional(db)
            .await
    }

    pub async fn delete_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn search(db: &PgPool, q: &ResolvedSearch) -> sqlx::Result<(Vec<User>, i64)> {
        let users = search_query(q)
            .build_query_as::<User>()
            .fetch_all(db)
            .await?;
        let total = count_query(q)
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;
        Ok((users, total))
    }
}

/// OR-group of case-insensitive matches over the searchable fields,
/// ANDed with the exact-match filters. No filter at all matches everything.
fn push_filters(qb: &mut QueryBuilder<'static, Postgres>, q: &ResolvedSearch) {
    let mut has_where = false;
    if let Some(term) = &q.search_term {
        let pattern = format!("%{term}%");
        qb.push(" WHERE (");
        {
            let mut ors = qb.separated(" OR ");
            for field in SEARCHABLE_FIELDS {
                ors.push(*field);
                ors.push_unseparated(" ILIKE ");
                ors.push_bind_unseparated(pattern.clone());
            }
        }
        qb.push(")");
        has_where = true;
    }
    for (field, value) in &q.filters {
        qb.push(if has_where { " AND " } else { " WHERE " });
        has_where = true;
        qb.push(*field);
        qb.push(" = ");
        qb.push_bind(value.clone());
    }
}

fn search_query(q: &ResolvedSearch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
    push_filters(&mut qb, q);
    if let Some((column, direction)) = q.sort {
        qb.push(" ORDER BY ");
        qb.push(column);
        qb.push(" ");
        qb.push(direction.as_sql());
    }
    qb.push(" LIMIT ");
    qb.push_bind(q.limit);
    qb.push(" OFFSET ");
    qb.push_bind(q.offset);
    qb
}

fn count_query(q: &ResolvedSearch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM users");
    push_filters(&mut qb, q);
    qb
}
