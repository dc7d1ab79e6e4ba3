use std::sync::Arc;

use teloxide::prelude::*;

use ziji_core::domain::Recipient;

use crate::router::AppState;

/// Split `/cmd@bot arg...` into `(cmd, arg)`.
///
/// Returns `None` when the command is addressed to another bot.
fn parse_command(text: &str, bot_username: &str) -> Option<(String, String)> {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let mut name = first.trim_start_matches('/').splitn(2, '@');
    let cmd = name.next().unwrap_or("").to_lowercase();
    if let Some(target) = name.next() {
        if !target.eq_ignore_ascii_case(bot_username) {
            return None;
        }
    }

    Some((cmd, rest))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Help,
    Model,
    Clear,
    Balance,
    Img,
}

/// Map a command name, including its Chinese alias, to a command.
fn command_of(name: &str) -> Option<Command> {
    match name {
        "start" | "help" | "帮助" => Some(Command::Help),
        "model" | "模型" => Some(Command::Model),
        "clear" | "清理" => Some(Command::Clear),
        "balance" | "余额" => Some(Command::Balance),
        "img" | "图片" => Some(Command::Img),
        _ => None,
    }
}

fn help_text() -> &'static str {
    "ziji\n\n\
Commands:\n\
/help (/帮助) - Show this message\n\
/model (/模型) - Switch to the next chat model (clears history)\n\
/clear (/清理) - Clear your conversation history\n\
/balance (/余额) - Show the DeepSeek account balance\n\
/img (/图片) <description> - Generate an image\n\n\
In groups, mention the bot to talk to it.\n\
Messages starting with ! or . are ignored."
}

pub async fn handle_command(
    _bot: Bot,
    msg: &Message,
    recipient: Recipient,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some((cmd, arg)) = parse_command(text, &state.bot_username) else {
        return Ok(());
    };
    tracing::info!(user_id = recipient.user_id.0, "command /{cmd}");

    let Some(command) = command_of(&cmd) else {
        send_reply(&state, &recipient, &format!("Unknown command: /{cmd}. Try /help")).await;
        return Ok(());
    };

    let reply = match command {
        Command::Help => help_text().to_string(),
        Command::Model => {
            let model = state
                .services
                .conversations
                .cycle_model(recipient.user_id)
                .await;
            format!("Model switched to {model}")
        }
        Command::Clear => {
            state
                .services
                .conversations
                .clear_history(recipient.user_id)
                .await;
            "History cleared".to_string()
        }
        Command::Balance => balance_text(&state).await,
        Command::Img => {
            let _guard = state.reply_locks.lock_user(recipient.user_id.0).await;
            match generate_image(&state, &recipient, &arg).await {
                Some(reply) => reply,
                None => return Ok(()),
            }
        }
    };

    send_reply(&state, &recipient, &reply).await;
    Ok(())
}

async fn balance_text(state: &AppState) -> String {
    let Some(client) = state.services.deepseek.as_ref() else {
        return "DeepSeek is not configured".to_string();
    };
    match client.balance().await {
        Ok(Some(b)) => format!("Balance: {} {}", b.total_balance, b.currency),
        Ok(None) => "No balance information available".to_string(),
        Err(e) => {
            tracing::warn!("balance query failed: {e}");
            format!("Balance query failed: {e}")
        }
    }
}

/// Generate, save and upload an image.
///
/// Returns the text to send instead, or `None` once the image is uploaded.
async fn generate_image(state: &AppState, recipient: &Recipient, prompt: &str) -> Option<String> {
    if prompt.is_empty() {
        return Some("Usage: /img <description>".to_string());
    }
    let Some(client) = state.services.image_client.as_ref() else {
        return Some("Image generation is not configured".to_string());
    };

    let result = async {
        let body = client.generate(prompt).await?;
        let path = state.services.images.save(body).await?;
        state.messenger.upload_file(recipient.chat_id, &path).await?;
        Ok::<_, ziji_core::Error>(path)
    }
    .await;

    match result {
        Ok(path) => {
            tracing::info!(path = %path.display(), "image delivered");
            None
        }
        Err(e) => {
            tracing::warn!("image generation failed: {e}");
            Some(format!("Image generation failed: {e}"))
        }
    }
}

async fn send_reply(state: &AppState, recipient: &Recipient, text: &str) {
    let mention = recipient.mention();
    if let Err(e) = state
        .messenger
        .send_text(recipient.chat_id, text, mention.as_ref())
        .await
    {
        tracing::warn!(chat_id = recipient.chat_id.0, "failed to send reply: {e}");
    }
}
