//! User repository backed by SeaORM.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{extension::postgres::PgBinOper, Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    DbErr, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    SqlErr, Value,
};
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity, ProfileModel};
use crate::domain::{
    FilterValue, NewUser, Predicate, SortDirection, SortKey, User, UserChanges, UserField,
    UserProfile, UserQuery,
};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User record store.
///
/// Reads that return [`UserProfile`] never load the password hash; only
/// [`UserRepository::find_by_email`] returns the full record. All methods
/// fail with [`AppError::Database`] when the store is unreachable.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Whether any user already holds `email`
    async fn exists_by_email(&self, email: &str) -> AppResult<bool>;

    /// Insert a new user; the store assigns the id and timestamps
    async fn insert(&self, user: NewUser) -> AppResult<User>;

    /// Find user by ID, password excluded
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>>;

    /// Find user by email, password hash included
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Filtered, ordered page of users, password excluded
    async fn find(&self, query: &UserQuery, skip: u64, limit: u64)
        -> AppResult<Vec<UserProfile>>;

    /// Number of users matching the query filters
    async fn count(&self, query: &UserQuery) -> AppResult<u64>;

    /// Overwrite the given fields; returns the number of matched records
    async fn update_by_id(&self, id: Uuid, changes: UserChanges) -> AppResult<u64>;

    /// Hard delete; returns the number of removed records
    async fn delete_by_id(&self, id: Uuid) -> AppResult<u64>;
}

/// Concrete implementation of UserRepository
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn exists_by_email(&self, email: &str) -> AppResult<bool> {
        let count = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn insert(&self, new_user: NewUser) -> AppResult<User> {
        let now = Utc::now();
        let (code_id, code_expired) = match new_user.verification {
            Some(code) => (Some(code.code_id), Some(code.expires_at)),
            None => (None, None),
        };

        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new_user.name),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            phone: Set(new_user.phone),
            address: Set(new_user.address),
            image: Set(new_user.image),
            code_id: Set(code_id),
            code_expired: Set(code_expired),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&self.db).await.map_err(map_insert_error)?;
        Ok(User::from(model))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        let result = UserEntity::find_by_id(id)
            .into_partial_model::<ProfileModel>()
            .one(&self.db)
            .await?;

        Ok(result.map(UserProfile::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        Ok(result.map(User::from))
    }

    async fn find(
        &self,
        query: &UserQuery,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<UserProfile>> {
        let condition = filter_condition(query, self.backend())?;
        let models = apply_sort(UserEntity::find().filter(condition), &query.sort)
            .offset(skip)
            .limit(limit)
            .into_partial_model::<ProfileModel>()
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(UserProfile::from).collect())
    }

    async fn count(&self, query: &UserQuery) -> AppResult<u64> {
        let condition = filter_condition(query, self.backend())?;
        let total = UserEntity::find().filter(condition).count(&self.db).await?;
        Ok(total)
    }

    async fn update_by_id(&self, id: Uuid, changes: UserChanges) -> AppResult<u64> {
        let mut update = UserEntity::update_many()
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(id));

        if let Some(name) = changes.name {
            update = update.col_expr(user::Column::Name, Expr::value(name));
        }
        if let Some(phone) = changes.phone {
            update = update.col_expr(user::Column::Phone, Expr::value(phone));
        }
        if let Some(address) = changes.address {
            update = update.col_expr(user::Column::Address, Expr::value(address));
        }
        if let Some(image) = changes.image {
            update = update.col_expr(user::Column::Image, Expr::value(image));
        }

        let result = update.exec(&self.db).await?;
        Ok(result.rows_affected)
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<u64> {
        let result = UserEntity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected)
    }
}

/// The unique index on `email` is authoritative; concurrent inserts that
/// both passed the existence check end up here.
fn map_insert_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateEmail,
        _ => AppError::Database(err),
    }
}

fn column(field: UserField) -> user::Column {
    match field {
        UserField::Id => user::Column::Id,
        UserField::Name => user::Column::Name,
        UserField::Email => user::Column::Email,
        UserField::Phone => user::Column::Phone,
        UserField::Address => user::Column::Address,
        UserField::Image => user::Column::Image,
        UserField::CodeId => user::Column::CodeId,
        UserField::CodeExpired => user::Column::CodeExpired,
        UserField::CreatedAt => user::Column::CreatedAt,
        UserField::UpdatedAt => user::Column::UpdatedAt,
    }
}

fn to_value(value: &FilterValue) -> AppResult<Value> {
    match value {
        FilterValue::Text(text) => Ok(text.clone().into()),
        FilterValue::Id(id) => Ok((*id).into()),
        FilterValue::Timestamp(ts) => Ok((*ts).into()),
        FilterValue::Null => Err(AppError::invalid_query(
            "null can only be compared for equality",
        )),
    }
}

/// Translate query filters into a SQL condition (all filters must hold).
fn filter_condition(query: &UserQuery, backend: DbBackend) -> AppResult<Condition> {
    let mut condition = Condition::all();

    for filter in &query.filters {
        let col = column(filter.field);
        condition = match &filter.predicate {
            Predicate::Eq(FilterValue::Null) | Predicate::Exists(false) => {
                condition.add(col.is_null())
            }
            Predicate::Ne(FilterValue::Null) | Predicate::Exists(true) => {
                condition.add(col.is_not_null())
            }
            Predicate::Eq(value) => condition.add(col.eq(to_value(value)?)),
            Predicate::Ne(value) => {
                let ne = col.ne(to_value(value)?);
                if filter.field.is_nullable() {
                    // Missing values differ from any given value.
                    condition.add(Condition::any().add(ne).add(col.is_null()))
                } else {
                    condition.add(ne)
                }
            }
            Predicate::Gt(value) => condition.add(col.gt(to_value(value)?)),
            Predicate::Gte(value) => condition.add(col.gte(to_value(value)?)),
            Predicate::Lt(value) => condition.add(col.lt(to_value(value)?)),
            Predicate::Lte(value) => condition.add(col.lte(to_value(value)?)),
            Predicate::In(values) => condition.add(membership(filter.field, values, false)?),
            Predicate::NotIn(values) => condition.add(membership(filter.field, values, true)?),
            Predicate::Matches {
                pattern,
                case_insensitive,
            } => condition.add(regex_match(col, pattern, *case_insensitive, backend)?),
        };
    }

    Ok(condition)
}

/// `IN` / `NOT IN`, with a `null` member mapped to an explicit null test.
///
/// Without a `null` member, `NOT IN` on an optional column keeps missing
/// values, as `!=` does.
fn membership(field: UserField, values: &[FilterValue], negate: bool) -> AppResult<Condition> {
    let col = column(field);
    let has_null = values.contains(&FilterValue::Null);
    let present = values
        .iter()
        .filter(|v| **v != FilterValue::Null)
        .map(to_value)
        .collect::<AppResult<Vec<_>>>()?;

    let condition = if !negate {
        Condition::any()
            .add(col.is_in(present))
            .add_option(has_null.then(|| col.is_null()))
    } else if has_null {
        Condition::all()
            .add(col.is_not_in(present))
            .add(col.is_not_null())
    } else if field.is_nullable() {
        Condition::any()
            .add(col.is_not_in(present))
            .add(col.is_null())
    } else {
        Condition::all().add(col.is_not_in(present))
    };
    Ok(condition)
}

fn regex_match(
    col: user::Column,
    pattern: &str,
    case_insensitive: bool,
    backend: DbBackend,
) -> AppResult<SimpleExpr> {
    match backend {
        DbBackend::Postgres => {
            let op = if case_insensitive {
                PgBinOper::RegexCaseInsensitive
            } else {
                PgBinOper::Regex
            };
            Ok(Expr::col((UserEntity, col)).binary(op, Expr::val(pattern.to_string())))
        }
        _ => Err(AppError::invalid_query(
            "regular expression filters require PostgreSQL",
        )),
    }
}

/// Requested order, then `id` so pages never overlap; insertion order when unsorted.
fn apply_sort(select: Select<UserEntity>, sort: &[SortKey]) -> Select<UserEntity> {
    if sort.is_empty() {
        return select
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Id);
    }

    sort.iter()
        .fold(select, |select, key| {
            let order = match key.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            select.order_by(column(key.field), order)
        })
        .order_by_asc(user::Column::Id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::QueryTrait;

    fn render_filter(raw: &str) -> String {
        let query = UserQuery::parse(raw).unwrap();
        let condition = filter_condition(&query, DbBackend::Postgres).unwrap();
        UserEntity::find()
            .filter(condition)
            .build(DbBackend::Postgres)
            .to_string()
    }

    fn render_sorted(raw: &str) -> String {
        let query = UserQuery::parse(raw).unwrap();
        apply_sort(UserEntity::find(), &query.sort)
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn test_password_hash_not_in_projection() {
        let sql = UserEntity::find()
            .into_partial_model::<ProfileModel>()
            .into_statement(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains("\"email\""));
        assert!(!sql.contains("password_hash"));
    }

    #[test]
    fn test_equality() {
        let sql = render_filter("name=A");
        assert!(sql.contains("\"users\".\"name\" = 'A'"), "{}", sql);
    }

    #[test]
    fn test_not_equal_on_optional_field_keeps_missing() {
        let sql = render_filter("phone!=0901234567");
        assert!(sql.contains("\"users\".\"phone\" <> '0901234567'"), "{}", sql);
        assert!(sql.contains("\"users\".\"phone\" IS NULL"), "{}", sql);
        assert!(sql.contains(" OR "), "{}", sql);
    }

    #[test]
    fn test_not_in_on_optional_field_keeps_missing() {
        let sql = render_filter("phone!=0901234567,0912345678");
        assert!(
            sql.contains("\"users\".\"phone\" NOT IN ('0901234567', '0912345678')"),
            "{}",
            sql
        );
        assert!(sql.contains("\"users\".\"phone\" IS NULL"), "{}", sql);
        assert!(sql.contains(" OR "), "{}", sql);
    }

    #[test]
    fn test_not_in_with_null_member_excludes_missing() {
        let sql = render_filter("phone!=0901234567,null");
        assert!(sql.contains("\"users\".\"phone\" IS NOT NULL"), "{}", sql);
        assert!(!sql.contains(" OR "), "{}", sql);
    }

    #[test]
    fn test_not_in_on_required_field() {
        let sql = render_filter("email!=a@x.com,b@x.com");
        assert!(
            sql.contains("\"users\".\"email\" NOT IN ('a@x.com', 'b@x.com')"),
            "{}",
            sql
        );
        assert!(!sql.contains("IS NULL"), "{}", sql);
    }

    #[test]
    fn test_presence() {
        assert!(render_filter("!image").contains("\"users\".\"image\" IS NULL"));
        assert!(render_filter("image").contains("\"users\".\"image\" IS NOT NULL"));
    }

    #[test]
    fn test_membership() {
        let sql = render_filter("email=a@x.com,b@x.com");
        assert!(
            sql.contains("\"users\".\"email\" IN ('a@x.com', 'b@x.com')"),
            "{}",
            sql
        );
    }

    #[test]
    fn test_range() {
        let sql = render_filter("createdAt>=2024-01-01");
        assert!(sql.contains("\"users\".\"created_at\" >="), "{}", sql);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let sql = render_filter("name=A&address=Hanoi");
        assert!(sql.contains(" AND "), "{}", sql);
    }

    #[test]
    fn test_regex_postgres() {
        let sql = render_filter("name=/^ng/i");
        assert!(sql.contains("~*"), "{}", sql);
        assert!(sql.contains("'^ng'"), "{}", sql);
    }

    #[test]
    fn test_regex_requires_postgres() {
        let query = UserQuery::parse("name=/^ng/").unwrap();
        let result = filter_condition(&query, DbBackend::MySql);
        assert!(matches!(result, Err(AppError::InvalidQuery(_))));
    }

    #[test]
    fn test_default_order_is_insertion_order() {
        let sql = render_sorted("");
        assert!(
            sql.contains("ORDER BY \"users\".\"created_at\" ASC, \"users\".\"id\" ASC"),
            "{}",
            sql
        );
    }

    #[test]
    fn test_requested_order_with_id_tiebreak() {
        let sql = render_sorted("sort=-name");
        assert!(
            sql.contains("ORDER BY \"users\".\"name\" DESC, \"users\".\"id\" ASC"),
            "{}",
            sql
        );
    }

    #[test]
    fn test_other_insert_errors_stay_database_errors() {
        let err = map_insert_error(DbErr::Custom("boom".into()));
        assert!(matches!(err, AppError::Database(_)));
    }
}
