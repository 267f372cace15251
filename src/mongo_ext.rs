use std::ops::{Deref, DerefMut};

use bson::{oid::ObjectId, Document};
use mongodb::options::FindOptions;
use serde::de::DeserializeOwned;

use crate::error::Error;

pub struct Collection<T>(pub mongodb::Collection<T>);

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Collection<T> {
    type Target = mongodb::Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Collection<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> From<mongodb::Collection<T>> for Collection<T> {
    fn from(value: mongodb::Collection<T>) -> Self {
        Self(value)
    }
}

/// Merges the soft-delete exclusion into a filter. `$ne: true` rather than
/// `false` so documents written before the flag existed still match.
fn active_filter(filter: Option<Document>) -> Document {
    let mut filter = filter.unwrap_or_default();
    filter.insert("isDeleted", bson::doc! { "$ne": true });
    filter
}

impl<T> Collection<T>
where
    T: DeserializeOwned + Send + Sync + Unpin,
{
    /// Direct id lookup, soft-deleted documents included.
    pub async fn find_one_by_id(&self, id: ObjectId) -> Result<Option<T>, Error> {
        self.find_one(bson::doc! { "_id": id }, None)
            .await
            .map_err(Into::into)
    }

    pub async fn find_active_all(
        &self,
        filter: Option<Document>,
        options: impl Into<Option<FindOptions>>,
    ) -> Result<Vec<T>, Error> {
        let mut cursor = self.find(active_filter(filter), options).await?;

        let mut all = vec![];

        while cursor.advance().await? {
            all.push(cursor.deserialize_current()?);
        }

        Ok(all)
    }

    pub async fn count_active(&self, filter: Option<Document>) -> Result<u64, Error> {
        self.count_documents(active_filter(filter), None)
            .await
            .map_err(Into::into)
    }

    /// Returns whether a document matched.
    pub async fn update_one_by_id(
        &self,
        id: ObjectId,
        update: impl Into<mongodb::options::UpdateModifications>,
    ) -> Result<bool, Error> {
        self.update_one(bson::doc! { "_id": id }, update, None)
            .await
            .map(|it| it.matched_count > 0)
            .map_err(Into::into)
    }

    pub async fn soft_delete_one_by_id(&self, id: ObjectId) -> Result<bool, Error> {
        self.update_one_by_id(
            id,
            bson::doc! {
                "$set": {
                    "isDeleted": true,
                    "updatedAt": bson::DateTime::from(time::OffsetDateTime::now_utc()),
                }
            },
        )
        .await
    }
}
