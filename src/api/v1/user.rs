use std::str::FromStr;

use axum::{
    extract::{Query, State},
    Json,
};
use bson::{oid::ObjectId, Document};
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{error::Error, util::Envelope, validate};

use super::auth::{
    ensure_phone_unique, AdminAccess, UserAccess, UserCollection, UserResponse,
};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub id: String,
}

#[tracing::instrument(
    skip_all,
    fields(
        id = %request.id,
        user = ?user,
    )
)]
pub async fn update_user(
    user: UserAccess,
    State(users): State<UserCollection>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Envelope<()>>, Error> {
    validate::validate_name("First name", &request.first_name)?;
    validate::validate_name("Last name", &request.last_name)?;
    validate::validate_phone_number(&request.phone_number)?;
    if let Some(email) = &request.email {
        validate::validate_update_email(email)?;
    }
    validate::validate_address(&request.address)?;

    let id = ObjectId::from_str(&request.id).map_err(|err| Error::Internal(err.into()))?;

    ensure_phone_unique(&users, &request.phone_number, Some(id)).await?;

    let mut set = bson::doc! {
        "firstName": &request.first_name,
        "lastName": &request.last_name,
        "phoneNumber": &request.phone_number,
        "updatedAt": bson::DateTime::from(OffsetDateTime::now_utc()),
    };
    if let Some(email) = &request.email {
        set.insert("email", email);
    }

    let updated = users
        .update_one_by_id(id, bson::doc! { "$set": set })
        .await?;

    if !updated {
        return Err(Error::Internal(anyhow::anyhow!(
            "account {} does not exist",
            id
        )));
    }

    Ok(Json(Envelope::message(
        "Your information has been successfully updated",
    )))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetUserByIdQuery {
    #[serde(default)]
    pub user_id: String,
}

#[tracing::instrument(skip_all, fields(id = %query.user_id))]
pub async fn get_user_by_id(
    _user: UserAccess,
    State(users): State<UserCollection>,
    Query(query): Query<GetUserByIdQuery>,
) -> Result<Json<Envelope<UserResponse>>, Error> {
    let user_id =
        ObjectId::from_str(&query.user_id).map_err(|err| Error::Internal(err.into()))?;

    // direct id lookups deliberately see soft-deleted accounts too
    let user = users
        .find_one_by_id(user_id)
        .await?
        .ok_or_else(|| Error::validation("User not found"))?;

    Ok(Json(Envelope::data(user.into())))
}

async fn collect_users(
    users: &UserCollection,
    filter: Option<Document>,
    options: FindOptions,
) -> Result<Vec<UserResponse>, Error> {
    let found = users.find_active_all(filter, options).await?;

    Ok(found.into_iter().map(Into::into).collect())
}

#[tracing::instrument(skip_all)]
pub async fn get_users(
    _user: UserAccess,
    State(users): State<UserCollection>,
) -> Result<Json<Envelope<Vec<UserResponse>>>, Error> {
    let found = collect_users(
        &users,
        None,
        FindOptions::builder()
            .sort(bson::doc! { "createdAt": 1 })
            .build(),
    )
    .await?;

    if found.is_empty() {
        return Err(Error::validation("No users found"));
    }

    Ok(Json(Envelope::data(found)))
}

/// Case-insensitive substring match across the four searchable fields.
fn search_filter(search: &str) -> Document {
    let regex = bson::doc! { "$regex": search, "$options": "i" };

    bson::doc! {
        "$or": [
            { "phoneNumber": regex.clone() },
            { "firstName": regex.clone() },
            { "lastName": regex.clone() },
            { "email": regex },
        ]
    }
}

fn parse_page_number(value: Option<&String>) -> Option<i64> {
    value.and_then(|it| it.parse().ok())
}

/// Saturates so extreme but parseable page numbers cannot overflow.
fn skip_rows(rows_per_page: i64, page: i64) -> u64 {
    rows_per_page
        .saturating_mul(page.saturating_sub(1))
        .max(0) as u64
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetUsersPageQuery {
    #[serde(default)]
    pub rows_per_page: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UsersPageData {
    pub datas: Vec<UserResponse>,
    pub total_records: u64,
}

#[tracing::instrument(skip_all, fields(query = ?query))]
pub async fn get_users_page(
    _user: UserAccess,
    State(users): State<UserCollection>,
    Query(query): Query<GetUsersPageQuery>,
) -> Result<Json<Envelope<UsersPageData>>, Error> {
    let (rows_per_page, page) = match (
        parse_page_number(query.rows_per_page.as_ref()),
        parse_page_number(query.page.as_ref()),
    ) {
        (Some(rows_per_page), Some(page)) => (rows_per_page, page),
        _ => return Err(Error::validation("Invalid input values")),
    };

    let filter = query
        .search
        .as_deref()
        .filter(|it| !it.is_empty())
        .map(search_filter);

    let options = FindOptions::builder()
        .sort(bson::doc! { "createdAt": 1 })
        .skip(skip_rows(rows_per_page, page))
        .limit(rows_per_page.max(0))
        .build();

    let datas = collect_users(&users, filter.clone(), options).await?;

    // the total ignores pagination so clients can size their pagers
    let total_records = users.count_active(filter).await?;

    if datas.is_empty() {
        return Err(Error::validation("No users found"));
    }

    Ok(Json(Envelope::data(UsersPageData {
        datas,
        total_records,
    })))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetUsersByQueryParams {
    #[serde(default)]
    pub rows_per_page: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub filter_by: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UsersQueryData {
    pub users: Vec<UserResponse>,
    pub total_records: u64,
}

/// Like [`get_users_page`] but with defaults, an optional role filter and
/// newest-first ordering. The two orderings differ on purpose.
#[tracing::instrument(skip_all, fields(query = ?query))]
pub async fn get_users_by_query(
    _user: UserAccess,
    State(users): State<UserCollection>,
    Query(query): Query<GetUsersByQueryParams>,
) -> Result<Json<Envelope<UsersQueryData>>, Error> {
    let rows_per_page = parse_page_number(query.rows_per_page.as_ref()).unwrap_or(10);
    let page = parse_page_number(query.page.as_ref()).unwrap_or(1);

    let mut filter = query
        .search
        .as_deref()
        .filter(|it| !it.is_empty())
        .map(search_filter)
        .unwrap_or_default();

    if let Some(role) = query.filter_by.as_deref().filter(|it| !it.is_empty()) {
        filter.insert("role", role);
    }

    let options = FindOptions::builder()
        .sort(bson::doc! { "createdAt": -1 })
        .skip(skip_rows(rows_per_page, page))
        .limit(rows_per_page.max(0))
        .build();

    let found = collect_users(&users, Some(filter.clone()), options).await?;
    let total_records = users.count_active(Some(filter)).await?;

    if found.is_empty() {
        return Err(Error::validation("No users found"));
    }

    Ok(Json(Envelope::data(UsersQueryData {
        users: found,
        total_records,
    })))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

async fn soft_delete(users: &UserCollection, user_id: &str) -> Result<Json<Envelope<()>>, Error> {
    let user_id = ObjectId::from_str(user_id).map_err(|err| Error::Internal(err.into()))?;

    let deleted = users.soft_delete_one_by_id(user_id).await?;

    if !deleted {
        return Err(Error::validation("User not found"));
    }

    Ok(Json(Envelope::message("User has been successfully deleted")))
}

#[tracing::instrument(skip_all, fields(user = ?user))]
pub async fn delete_user(
    user: UserAccess,
    State(users): State<UserCollection>,
    Json(request): Json<DeleteUserRequest>,
) -> Result<Json<Envelope<()>>, Error> {
    let user_id = request
        .user_id
        .ok_or_else(|| Error::Internal(anyhow::anyhow!("missing userId")))?;

    soft_delete(&users, &user_id).await
}

#[tracing::instrument(skip_all, fields(admin = ?admin))]
pub async fn admin_get_all_users(
    admin: AdminAccess,
    State(users): State<UserCollection>,
) -> Result<Json<Envelope<Vec<UserResponse>>>, Error> {
    let found = collect_users(
        &users,
        None,
        FindOptions::builder()
            .sort(bson::doc! { "createdAt": 1 })
            .build(),
    )
    .await?;

    if found.is_empty() {
        return Err(Error::validation("No users found"));
    }

    Ok(Json(Envelope::data(found)))
}

#[tracing::instrument(skip_all, fields(admin = ?admin))]
pub async fn admin_delete_user(
    admin: AdminAccess,
    State(users): State<UserCollection>,
    Json(request): Json<DeleteUserRequest>,
) -> Result<Json<Envelope<()>>, Error> {
    let user_id = match request.user_id {
        Some(user_id) if !user_id.is_empty() => user_id,
        _ => return Err(Error::validation("User ID is required")),
    };

    soft_delete(&users, &user_id).await
}
