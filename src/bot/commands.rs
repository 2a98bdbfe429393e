//! Maps inbound chat messages and inline queries to bot commands.

use std::collections::HashMap;

use super::format::Language;
use crate::fxrates::VES;

/// A routable bot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Rate,
    Rates,
    Currencies,
    Unknown,
}

/// Routing decision for one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub command: Command,
    pub args: Vec<String>,
    pub locale: Language,
}

/// An incoming update reduced to what routing needs.
#[derive(Debug, Clone, Copy)]
pub enum InboundEvent<'a> {
    Message {
        text: &'a str,
    },
    InlineQuery {
        query: &'a str,
        language_code: Option<&'a str>,
    },
}

struct RouteEntry {
    command: Command,
    locale: Language,
    /// Pre-filled base currency for the VES shortcut commands.
    base: Option<&'static str>,
}

/// Resolves command aliases. The alias table is built once and never mutated,
/// so routing the same event always yields the same route.
pub struct CommandRouter {
    aliases: HashMap<&'static str, RouteEntry>,
}

impl CommandRouter {
    pub fn new() -> Self {
        let mut aliases = HashMap::new();

        let mut alias = |name: &'static str, command: Command, locale: Language| {
            aliases.insert(
                name,
                RouteEntry {
                    command,
                    locale,
                    base: None,
                },
            );
        };

        alias("/inicio", Command::Start, Language::Es);
        alias("/start", Command::Start, Language::En);
        alias("/ayuda", Command::Help, Language::Es);
        alias("/help", Command::Help, Language::En);
        alias("/tasa", Command::Rate, Language::Es);
        alias("/rate", Command::Rate, Language::En);
        alias("/tasas", Command::Rates, Language::Es);
        alias("/rates", Command::Rates, Language::En);
        alias("/monedas", Command::Currencies, Language::Es);
        alias("/currencies", Command::Currencies, Language::En);

        let mut shortcut = |name: &'static str, base: &'static str| {
            aliases.insert(
                name,
                RouteEntry {
                    command: Command::Rate,
                    locale: Language::Es,
                    base: Some(base),
                },
            );
        };

        shortcut("/dolar", "USD");
        shortcut("/euro", "EUR");
        shortcut("/usdt", "USDT");
        shortcut("/rublo", "RUB");
        shortcut("/lira", "TRY");
        shortcut("/yuan", "CNY");

        Self { aliases }
    }

    /// Routes an inbound event to a command, its arguments and a reply locale.
    pub fn route(&self, event: InboundEvent<'_>) -> Route {
        match event {
            InboundEvent::Message { text } => self.route_message(text),
            InboundEvent::InlineQuery {
                query,
                language_code,
            } => route_inline_query(query, language_code),
        }
    }

    fn route_message(&self, text: &str) -> Route {
        let unknown = Route {
            command: Command::Unknown,
            args: Vec::new(),
            locale: Language::Es,
        };

        let mut tokens = text.split_whitespace();
        let Some(first) = tokens.next() else {
            return unknown;
        };

        let alias = normalize_alias(first);
        let Some(entry) = self.aliases.get(alias.as_str()) else {
            return unknown;
        };

        // Shortcuts carry their own arguments and ignore anything typed after.
        let args = match entry.base {
            Some(base) => vec![base.to_string(), VES.to_string()],
            None => tokens.map(str::to_string).collect(),
        };

        Route {
            command: entry.command,
            args,
            locale: entry.locale,
        }
    }
}

/// Drops the `@BotName` mention suffix and lowercases the alias, so
/// `/TASA@ChiguiCifrasBot` routes the same as `/tasa`.
fn normalize_alias(token: &str) -> String {
    let head = token.split_once('@').map_or(token, |(head, _)| head);
    head.to_lowercase()
}

fn route_inline_query(query: &str, language_code: Option<&str>) -> Route {
    let locale = inline_locale(language_code);

    match parse_inline_query(query) {
        Some((base, target)) => Route {
            command: Command::Rate,
            args: vec![base, target],
            locale,
        },
        None => Route {
            command: Command::Help,
            args: Vec::new(),
            locale,
        },
    }
}

/// Inline queries have no command alias to infer the language from, so the
/// sender's IETF language code decides: an `en` prefix means English,
/// everything else (including absent) means Spanish.
fn inline_locale(language_code: Option<&str>) -> Language {
    match language_code {
        Some(code) if code.to_ascii_lowercase().starts_with("en") => Language::En,
        _ => Language::Es,
    }
}

/// Parses free-form inline text like `usd`, `USD VES`, `usd/ves` or `usd-eur`
/// into an uppercased (base, target) pair. The target defaults to VES.
fn parse_inline_query(query: &str) -> Option<(String, String)> {
    let normalized = query.trim().to_uppercase().replace(['/', '-'], " ");
    let mut parts = normalized.split_whitespace();

    let base = parts.next()?.to_string();
    let target = parts.next().unwrap_or(VES).to_string();

    Some((base, target))
}
