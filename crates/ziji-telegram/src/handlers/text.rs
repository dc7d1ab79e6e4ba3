use std::sync::Arc;

use teloxide::{prelude::*, types::ChatAction};

use ziji_core::{domain::Recipient, Error};

use crate::router::AppState;

/// One chat turn: record, ask the backend, record, deliver.
pub async fn handle_text(
    bot: Bot,
    recipient: Recipient,
    state: Arc<AppState>,
    input: String,
) -> ResponseResult<()> {
    let conversations = &state.services.conversations;
    let user = recipient.user_id;

    let _ = bot
        .send_chat_action(teloxide::types::ChatId(recipient.chat_id.0), ChatAction::Typing)
        .await;

    let (model, history) = conversations.push_user(user, &input).await;
    let reply = match state.services.backend.complete(model, &history).await {
        Ok(reply) => reply,
        Err(e) => {
            conversations.discard_pending(user).await;
            report_error(&state, &recipient, &e).await;
            return Ok(());
        }
    };
    conversations.push_assistant(user, &reply).await;

    match state.delivery.deliver_reply(&recipient, &reply).await {
        Ok(report) => {
            tracing::debug!(
                texts = report.texts_sent,
                files = report.files_uploaded,
                "reply delivered"
            );
        }
        // Already reported to the chat by the delivery itself.
        Err(Error::Delivery(_)) => {}
        Err(e) => report_error(&state, &recipient, &e).await,
    }
    Ok(())
}

async fn report_error(state: &AppState, recipient: &Recipient, e: &Error) {
    tracing::warn!(user_id = recipient.user_id.0, "chat turn failed: {e}");
    let text = format!("Error processing message: {e}");
    if let Err(send_err) = state
        .messenger
        .send_text(recipient.chat_id, &text, recipient.mention().as_ref())
        .await
    {
        tracing::warn!("failed to report error: {send_err}");
    }
}
