//! Telegram update handlers.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{
    InlineQuery, InlineQueryResult, InlineQueryResultArticle, InputMessageContent,
    InputMessageContentText,
};
use tracing::{info, warn};

use super::commands::{Command, CommandRouter, InboundEvent, Route};
use super::format::{self, Language};
use super::selection::select_preferred_rate;
use crate::fxrates::{self, ExchangeRate, VES};

/// Dependencies shared by every handler invocation.
pub struct BotState {
    pub router: CommandRouter,
    pub fx: fxrates::Client,
}

impl BotState {
    pub fn new(fx: fxrates::Client) -> Self {
        Self {
            router: CommandRouter::new(),
            fx,
        }
    }
}

/// Handles chat messages. Anything that does not carry a known command is
/// ignored without a reply.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let route = state.router.route(InboundEvent::Message { text });

    let reply = match route.command {
        Command::Start => format::start_message(route.locale),
        Command::Help => format::help_message(route.locale),
        Command::Rate => rate_reply(&state, &route.args, route.locale).await,
        Command::Rates => rates_reply(&state, &route.args, route.locale).await,
        Command::Currencies => currencies_reply(&state, route.locale).await,
        Command::Unknown => return Ok(()),
    };

    info!("💬 Replying to {:?} in chat {}", route.command, msg.chat.id);

    if let Err(e) = bot.send_message(msg.chat.id, reply).await {
        warn!("Failed to send reply to {}: {e}", msg.chat.id);
    }

    Ok(())
}

/// Handles inline queries. Always answers with exactly one article: a rate
/// card, a help hint for blank queries, or an error/empty placeholder.
pub async fn handle_inline_query(
    bot: Bot,
    query: InlineQuery,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let route = state.router.route(InboundEvent::InlineQuery {
        query: &query.query,
        language_code: query.from.language_code.as_deref(),
    });

    let results = if route.command == Command::Rate {
        inline_rate_results(&state, &route).await
    } else {
        vec![help_article(route.locale)]
    };

    // Cache briefly; answers depend on the sender's language code.
    let mut answer = bot.answer_inline_query(query.id, results);
    answer.cache_time = Some(5);
    answer.is_personal = Some(true);

    if let Err(e) = answer.await {
        warn!("Failed to answer inline query: {e}");
    }

    Ok(())
}

async fn rate_reply(state: &BotState, args: &[String], locale: Language) -> String {
    let usage = match locale {
        Language::En => "/rate <base> [target]",
        Language::Es => "/tasa <base> [destino]",
    };

    let Some(first) = args.first() else {
        return format::invalid_usage_message(usage, locale);
    };

    let base = first.to_uppercase();
    let target = args
        .get(1)
        .map_or_else(|| VES.to_string(), |t| t.to_uppercase());

    let rates = match state.fx.rate(&base, &target).await {
        Ok(page) => page.results,
        Err(err) => {
            warn!("Rate lookup {base}/{target} failed: {err}");
            return format::error_message(&err, locale);
        }
    };

    match select_preferred_rate(&rates) {
        Some(rate) => format::format_rate(rate, locale),
        None => format::no_rates_for_pair(&base, &target, locale),
    }
}

async fn rates_reply(state: &BotState, args: &[String], locale: Language) -> String {
    let usage = match locale {
        Language::En => "/rates <base>",
        Language::Es => "/tasas <base>",
    };

    let Some(first) = args.first() else {
        return format::invalid_usage_message(usage, locale);
    };

    let base = first.to_uppercase();

    let rates = match state.fx.rates(&base).await {
        Ok(page) => page.results,
        Err(err) => {
            warn!("Rates lookup {base} failed: {err}");
            return format::error_message(&err, locale);
        }
    };

    if rates.is_empty() {
        return format::no_rates_for_base(&base, locale);
    }

    format::format_rates(&rates, locale)
}

async fn currencies_reply(state: &BotState, locale: Language) -> String {
    match state.fx.currencies().await {
        Ok(currencies) => format::format_currencies(&currencies.results, locale),
        Err(err) => {
            warn!("Currencies lookup failed: {err}");
            format::error_message(&err, locale)
        }
    }
}

async fn inline_rate_results(state: &BotState, route: &Route) -> Vec<InlineQueryResult> {
    let locale = route.locale;

    let (Some(base), Some(target)) = (route.args.first(), route.args.get(1)) else {
        return vec![help_article(locale)];
    };

    let rates = match state.fx.rate(base, target).await {
        Ok(page) => page.results,
        Err(err) => {
            warn!("Inline rate lookup {base}/{target} failed: {err}");
            return vec![error_article(locale)];
        }
    };

    match select_preferred_rate(&rates) {
        Some(rate) => vec![rate_article(rate, locale)],
        None => vec![empty_article(base, target, locale)],
    }
}

fn article(id: &str, title: &str, message: String) -> InlineQueryResultArticle {
    InlineQueryResultArticle::new(
        id,
        title,
        InputMessageContent::Text(InputMessageContentText::new(message)),
    )
}

fn rate_article(rate: &ExchangeRate, locale: Language) -> InlineQueryResult {
    let title = format!("{}/{}", rate.base, rate.target);
    let description = format!("{:.4} ({}, {})", rate.rate, rate.source, rate.rate_type);

    InlineQueryResult::Article(
        article(
            &inline_result_id(&title),
            &title,
            format::format_rate(rate, locale),
        )
        .description(description),
    )
}

fn help_article(locale: Language) -> InlineQueryResult {
    let (title, description, message) = match locale {
        Language::En => (
            "Help",
            "Type: USD VES (default target VES)",
            "Use: USD VES or just USD",
        ),
        Language::Es => (
            "Ayuda",
            "Escribe: USD VES (destino VES por defecto)",
            "Usa: USD VES o solo USD",
        ),
    };

    InlineQueryResult::Article(article("help", title, message.to_string()).description(description))
}

fn empty_article(base: &str, target: &str, locale: Language) -> InlineQueryResult {
    let title = match locale {
        Language::En => "No results",
        Language::Es => "Sin resultados",
    };

    InlineQueryResult::Article(article(
        "empty",
        title,
        format::no_rates_for_pair(base, target, locale),
    ))
}

fn error_article(locale: Language) -> InlineQueryResult {
    let message = match locale {
        Language::En => "Unable to fetch the rate",
        Language::Es => "No se pudo obtener la tasa",
    };

    InlineQueryResult::Article(article("error", "Error", message.to_string()))
}

/// Stable per-pair result id, e.g. "USD/VES" becomes "usd-ves".
fn inline_result_id(title: &str) -> String {
    title.to_lowercase().replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_rate() -> ExchangeRate {
        ExchangeRate {
            base: "USD".to_string(),
            target: "VES".to_string(),
            rate: 42.0,
            rate_type: "MID".to_string(),
            source: "BCV".to_string(),
            as_of: Utc.with_ymd_and_hms(2026, 1, 2, 15, 4, 0).unwrap(),
            fetched_at: Utc.with_ymd_and_hms(2026, 1, 2, 15, 5, 0).unwrap(),
        }
    }

    #[test]
    fn test_inline_result_ids_are_stable() {
        assert_eq!(inline_result_id("USD/VES"), "usd-ves");
        assert_eq!(inline_result_id("USDT/EUR"), "usdt-eur");
    }

    #[test]
    fn test_rate_article_carries_pair_and_description() {
        let InlineQueryResult::Article(result) = rate_article(&sample_rate(), Language::En)
        else {
            panic!("expected an article");
        };

        assert_eq!(result.id, "usd-ves");
        assert_eq!(result.title, "USD/VES");
        assert_eq!(result.description.as_deref(), Some("42.0000 (BCV, MID)"));
    }

    #[test]
    fn test_help_article_is_localized() {
        let InlineQueryResult::Article(es) = help_article(Language::Es) else {
            panic!("expected an article");
        };
        assert_eq!(es.id, "help");
        assert_eq!(es.title, "Ayuda");
        assert_eq!(
            es.description.as_deref(),
            Some("Escribe: USD VES (destino VES por defecto)")
        );

        let InlineQueryResult::Article(en) = help_article(Language::En) else {
            panic!("expected an article");
        };
        assert_eq!(en.title, "Help");
    }

    #[test]
    fn test_placeholder_articles_use_fixed_ids() {
        let InlineQueryResult::Article(empty) = empty_article("USD", "VES", Language::Es) else {
            panic!("expected an article");
        };
        assert_eq!(empty.id, "empty");
        assert_eq!(empty.title, "Sin resultados");

        let InlineQueryResult::Article(error) = error_article(Language::En) else {
            panic!("expected an article");
        };
        assert_eq!(error.id, "error");
        assert_eq!(error.title, "Error");
    }
}
