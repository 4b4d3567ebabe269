use super::*;
use crate::models::Notification;
use crate::types::*;

pub async fn list_for_user<C: GenericClient + Sync>(client: &C, user_id: UserId) -> Result<Vec<Notification>, RepoError> {
    fetch(
        client,
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC;",
        &[Box::new(user_id.0) as SqlArg],
    )
    .await
}

pub async fn insert<C: GenericClient + Sync>(client: &C, notification: &Notification) -> Result<Notification, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO notifications (id, user_id, kind, title, message, payload, is_read, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *;",
        &[
            Box::new(notification.id.0) as SqlArg,
            Box::new(notification.user_id.0),
            Box::new(notification.kind.as_str()),
            Box::new(notification.title.clone()),
            Box::new(notification.message.clone()),
            Box::new(notification.payload.clone()),
            Box::new(notification.is_read),
            Box::new(notification.created_at),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}
