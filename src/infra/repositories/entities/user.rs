//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::{DerivePartialModel, FromQueryResult};

use crate::domain::{User, UserProfile};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
    pub code_id: Option<Uuid>,
    pub code_expired: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Every column except `password_hash`; the hash is never selected.
#[derive(Clone, Debug, DerivePartialModel, FromQueryResult)]
#[sea_orm(entity = "Entity")]
pub struct ProfileModel {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
    pub code_id: Option<Uuid>,
    pub code_expired: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Convert database model to domain entity
impl From<Model> for User {
    fn from(model: Model) -> Self {
        User {
            id: model.id,
            name: model.name,
            email: model.email,
            password_hash: model.password_hash,
            phone: model.phone,
            address: model.address,
            image: model.image,
            code_id: model.code_id,
            code_expired: model.code_expired,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<ProfileModel> for UserProfile {
    fn from(model: ProfileModel) -> Self {
        UserProfile {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            address: model.address,
            image: model.image,
            code_id: model.code_id,
            code_expired: model.code_expired,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
