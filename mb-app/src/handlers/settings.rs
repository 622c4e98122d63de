//! Per-user default quality: the `/settings` keyboard and its callbacks.
//!
//! Callback data is `settings quality <q>` or `settings close`.

use super::AppContext;
use crate::messages::{self, Lang, Text};
use crate::router::{Handler, Request};
use async_trait::async_trait;
use mb_platform::Quality;
use mb_telegram::{InlineKeyboardButton, InlineKeyboardMarkup};
use std::str::FromStr;

fn settings_keyboard(lang: Lang, current: Quality) -> InlineKeyboardMarkup {
    let qualities = Quality::ALL
        .iter()
        .map(|quality| {
            let mark = if *quality == current { "✅ " } else { "" };
            InlineKeyboardButton {
                text: format!("{mark}{quality}"),
                callback_data: format!("settings quality {quality}"),
            }
        })
        .collect();
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            qualities,
            vec![InlineKeyboardButton {
                text: messages::text(lang, Text::SettingsClose).to_string(),
                callback_data: "settings close".to_string(),
            }],
        ],
    }
}

fn settings_text(lang: Lang, current: Quality) -> String {
    format!("{}: {current}", messages::text(lang, Text::SettingsTitle))
}

pub struct SettingsHandler;

#[async_trait]
impl Handler for SettingsHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(message) = request.update.message.as_ref() else {
            return Ok(());
        };
        let lang = Lang::from_code(message.language_code());
        let current = ctx.settings.effective_quality(
            message.from.as_ref().map(|u| u.id),
            None,
            ctx.cfg.music.default_quality,
        );
        ctx.reply_with_markup(
            &request.cancel,
            message,
            settings_text(lang, current),
            settings_keyboard(lang, current),
        )
        .await;
        Ok(())
    }
}

pub struct SettingsCallbackHandler;

#[async_trait]
impl Handler for SettingsCallbackHandler {
    async fn handle(&self, ctx: &AppContext, request: &Request<'_>) -> anyhow::Result<()> {
        let Some(query) = request.update.callback_query.as_ref() else {
            return Ok(());
        };
        let cancel = &request.cancel;
        let lang = Lang::from_code(query.from.language_code.as_deref());
        let data = query.data.as_deref().unwrap_or_default();
        let mut parts = data.split_whitespace().skip(1);

        match (parts.next(), parts.next()) {
            (Some("close"), _) => {
                ctx.answer_callback(cancel, &query.id, None).await;
                if let Some(message) = &query.message {
                    ctx.delete(cancel, message.chat.id, message.message_id).await;
                }
            }
            (Some("quality"), Some(raw)) => match Quality::from_str(raw) {
                Ok(quality) => {
                    ctx.settings.set_quality(query.from.id, quality);
                    tracing::debug!(user_id = query.from.id, %quality, "default quality updated");
                    ctx.answer_callback(
                        cancel,
                        &query.id,
                        Some(messages::text(lang, Text::SettingsSaved)),
                    )
                    .await;
                    if let Some(message) = &query.message {
                        ctx.edit(
                            cancel,
                            message.chat.id,
                            message.message_id,
                            settings_text(lang, quality),
                            Some(settings_keyboard(lang, quality)),
                        )
                        .await;
                    }
                }
                Err(error) => {
                    tracing::debug!(%error, "rejected settings callback");
                    ctx.answer_callback(
                        cancel,
                        &query.id,
                        Some(messages::text(lang, Text::InvalidQuality)),
                    )
                    .await;
                }
            },
            _ => {
                ctx.answer_callback(cancel, &query.id, None).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{
        RecordingApi, message_update, request, test_context, user_message,
    };
    use crate::router::RouteMatch;
    use mb_telegram::{CallbackQuery, Update, User};
    use std::sync::Arc;

    fn callback(data: &str) -> Update {
        Update {
            update_id: 9,
            callback_query: Some(CallbackQuery {
                id: "cb1".to_string(),
                from: User {
                    id: 42,
                    ..User::default()
                },
                message: Some(user_message("Default quality: hires")),
                data: Some(data.to_string()),
            }),
            ..Update::default()
        }
    }

    async fn press(ctx: &AppContext, data: &str) {
        let update = callback(data);
        SettingsCallbackHandler
            .handle(ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
    }

    fn answers(api: &Arc<RecordingApi>) -> Vec<Option<String>> {
        api.callback_answers
            .lock()
            .expect("lock")
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    #[tokio::test]
    async fn settings_shows_current_quality_with_buttons() {
        let (ctx, api) = test_context();
        let update = message_update(user_message("/settings"));
        SettingsHandler
            .handle(&ctx, &request(&update, RouteMatch::default()))
            .await
            .expect("handle");
        let sent = api.sent.lock().expect("lock").clone();
        assert_eq!(sent[0].text, "Default quality: hires");
        let keyboard = sent[0].reply_markup.clone().expect("keyboard");
        assert_eq!(keyboard.inline_keyboard[0].len(), Quality::ALL.len());
        assert_eq!(keyboard.inline_keyboard[0][0].text, "✅ hires");
        assert_eq!(keyboard.inline_keyboard[1][0].callback_data, "settings close");
    }

    #[tokio::test]
    async fn quality_callback_is_validated_and_saved() {
        let (ctx, api) = test_context();
        press(&ctx, "settings quality lossless").await;
        assert_eq!(ctx.settings.quality(42), Some(Quality::Lossless));
        assert_eq!(api.edit_texts(), vec!["Default quality: lossless".to_string()]);

        press(&ctx, "settings quality ultra").await;
        assert_eq!(ctx.settings.quality(42), Some(Quality::Lossless));
        assert_eq!(
            answers(&api),
            vec![Some("Saved.".to_string()), Some("Unknown quality.".to_string())]
        );
    }

    #[tokio::test]
    async fn close_deletes_the_keyboard_message() {
        let (ctx, api) = test_context();
        press(&ctx, "settings close").await;
        assert_eq!(api.deletes.lock().expect("lock").clone(), vec![(1, 5)]);
    }
}
