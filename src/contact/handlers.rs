use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    contact::{dto::ContactRequest, repo::Contact},
    error::{ApiError, Envelope},
    mail::contact_email,
    state::AppState,
};

pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/contactanos", post(create_contact))
}

/// Mails the stored contact to the admin address. Returns whether it was sent.
pub async fn notify_admin(state: &AppState, contact: &Contact) -> bool {
    let (subject, html) =
        contact_email(&contact.name, &contact.email, &contact.phone, &contact.message);
    match state
        .mailer
        .send_html(&state.config.admin_email, &subject, &html)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %format!("{e:#}"), contact_id = %contact.id, "contact notification not sent");
            false
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn create_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<Envelope<Contact>>, ApiError> {
    let Json(payload) = payload?;
    let req = payload.validated()?;

    let contact = Contact::create(&state.db, &req).await?;
    let mensaje = if notify_admin(&state, &contact).await {
        "Se creó el registro exitosamente y se envió la notificación"
    } else {
        "Se creó el registro exitosamente (nota: no se pudo enviar notificación por correo)"
    };

    info!(contact_id = %contact.id, "contact stored");
    Ok(Json(Envelope::with_message(mensaje, contact)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::mail::memory::MemoryMailer;
    use crate::storage::memory::MemoryStorage;

    fn contact() -> Contact {
        Contact {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@x.com".into(),
            phone: "123".into(),
            message: "¿Tienen recetas sin gluten?".into(),
            date: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn notification_goes_to_admin() {
        let mailer = Arc::new(MemoryMailer::default());
        let state = AppState::fake_with(Arc::new(MemoryStorage::default()), mailer.clone());

        assert!(notify_admin(&state, &contact()).await);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@example.com");
        assert!(sent[0].subject.contains("Ana"));
        assert!(sent[0].html.contains("sin gluten"));
    }

    #[tokio::test]
    async fn failed_notification_is_reported() {
        let mailer = Arc::new(MemoryMailer {
            failing: true,
            ..Default::default()
        });
        let state = AppState::fake_with(Arc::new(MemoryStorage::default()), mailer.clone());
        assert!(!notify_admin(&state, &contact()).await);
    }
}
