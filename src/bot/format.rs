use chrono::{DateTime, Utc};
use chrono_tz::America::Caracas;

use crate::fxrates::{Currency, ExchangeRate};

/// Output language for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Es,
    En,
}

fn currency_emoji(currency: &str) -> &'static str {
    match currency {
        "USD" => "💵",
        "EUR" => "💶",
        "VES" => "🇻🇪",
        "USDT" => "💲",
        "RUB" => "🇷🇺",
        "TRY" => "🇹🇷",
        "CNY" => "🇨🇳",
        _ => "💱",
    }
}

/// Renders a timestamp in Venezuela time.
fn format_time(value: &DateTime<Utc>) -> String {
    value
        .with_timezone(&Caracas)
        .format("%Y-%m-%d %H:%M VET")
        .to_string()
}

/// Left-aligns rows into columns, two spaces between a column and the widest
/// cell of the previous one. The last column is never padded.
fn align_columns(rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = Vec::new();

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();

            if i >= widths.len() {
                widths.push(len);
            } else if len > widths[i] {
                widths[i] = len;
            }
        }
    }

    let mut out = String::new();

    for (r, row) in rows.iter().enumerate() {
        if r > 0 {
            out.push('\n');
        }

        for (i, cell) in row.iter().enumerate() {
            out.push_str(cell);

            if i + 1 < row.len() {
                let pad = widths[i] + 2 - cell.chars().count();
                out.push_str(&" ".repeat(pad));
            }
        }
    }

    out
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// Formats a single exchange rate for display.
pub fn format_rate(rate: &ExchangeRate, lang: Language) -> String {
    let emoji = currency_emoji(&rate.base);

    let mut out = format!("{emoji} {} → {}\n\n", rate.base, rate.target);

    let details = match lang {
        Language::En => vec![
            row(&["Rate:", &format!("{:.4}", rate.rate)]),
            row(&["Source:", &rate.source]),
            row(&["Type:", &rate.rate_type]),
        ],
        Language::Es => vec![
            row(&["Tasa:", &format!("{:.4}", rate.rate)]),
            row(&["Fuente:", &rate.source]),
            row(&["Tipo:", &rate.rate_type]),
        ],
    };
    out.push_str(&align_columns(&details));
    out.push_str("\n\n");

    let stamps = match lang {
        Language::En => vec![
            row(&["📅 As of:", &format_time(&rate.as_of)]),
            row(&["🔄 Fetched:", &format_time(&rate.fetched_at)]),
        ],
        Language::Es => vec![
            row(&["📅 Fecha:", &format_time(&rate.as_of)]),
            row(&["🔄 Actualizado:", &format_time(&rate.fetched_at)]),
        ],
    };
    out.push_str(&align_columns(&stamps));

    out
}

/// Formats all rates for one base currency as a column table.
pub fn format_rates(rates: &[ExchangeRate], lang: Language) -> String {
    let Some(first) = rates.first() else {
        return match lang {
            Language::En => "No rates found".to_string(),
            Language::Es => "No se encontraron tasas".to_string(),
        };
    };

    let emoji = currency_emoji(&first.base);

    let mut out = match lang {
        Language::En => format!("{emoji} Rates for {}\n\n", first.base),
        Language::Es => format!("{emoji} Tasas de {}\n\n", first.base),
    };

    let header = match lang {
        Language::En => row(&["Target", "Rate", "Source", "Type"]),
        Language::Es => row(&["Destino", "Tasa", "Fuente", "Tipo"]),
    };

    let mut table = vec![header];
    for rate in rates {
        table.push(row(&[
            &rate.target,
            &format!("{:.4}", rate.rate),
            &rate.source,
            &rate.rate_type,
        ]));
    }
    out.push_str(&align_columns(&table));

    match lang {
        Language::En => out.push_str(&format!("\n📅 As of: {}", format_time(&first.as_of))),
        Language::Es => out.push_str(&format!("\n📅 Fecha: {}", format_time(&first.as_of))),
    }

    out
}

/// Formats the list of supported currencies.
pub fn format_currencies(currencies: &[Currency], lang: Language) -> String {
    let mut out = match lang {
        Language::En => "💱 Supported currencies\n\n".to_string(),
        Language::Es => "💱 Monedas soportadas\n\n".to_string(),
    };

    let header = match lang {
        Language::En => row(&["Currency", "Emoji"]),
        Language::Es => row(&["Moneda", "Emoji"]),
    };

    let mut table = vec![header];
    for currency in currencies {
        table.push(row(&[currency, currency_emoji(currency)]));
    }
    out.push_str(&align_columns(&table));

    out
}

/// The welcome message.
pub fn start_message(lang: Language) -> String {
    if lang == Language::En {
        let mut out = String::from("👋 Hello!\n\n");
        out.push_str("I provide real-time exchange rates for VES (Venezuelan Bolivar).\n\n");
        out.push_str("Quick commands:\n");
        out.push_str(&align_columns(&[
            row(&["• /dolar", "USD/VES rate"]),
            row(&["• /euro", "EUR/VES rate"]),
            row(&["• /usdt", "USDT/VES rate"]),
        ]));
        out.push_str("\n\nMore options:\n");
        out.push_str(&align_columns(&[
            row(&["• /rate <base> [target]", "Get a specific rate"]),
            row(&["• /rates <base>", "All rates for a currency"]),
            row(&["• /currencies", "List available currencies"]),
        ]));
        out.push_str("\n\nType /help to see all commands.");

        return out;
    }

    let mut out = String::from("👋 ¡Hola!\n\n");
    out.push_str("Ofrezco tasas de cambio en tiempo real para VES (Bolívar venezolano).\n\n");
    out.push_str("Comandos rápidos:\n");
    out.push_str(&align_columns(&[
        row(&["• /dolar", "Tasa USD/VES"]),
        row(&["• /euro", "Tasa EUR/VES"]),
        row(&["• /usdt", "Tasa USDT/VES"]),
    ]));
    out.push_str("\n\nMás opciones:\n");
    out.push_str(&align_columns(&[
        row(&["• /tasa <base> [destino]", "Obtener una tasa específica"]),
        row(&["• /tasas <base>", "Todas las tasas de una moneda"]),
        row(&["• /monedas", "Listar monedas disponibles"]),
    ]));
    out.push_str("\n\nEscribe /ayuda para ver todos los comandos.");

    out
}

/// The command catalog.
pub fn help_message(lang: Language) -> String {
    if lang == Language::En {
        let mut out = String::from("📖 ChiguiCifras Commands\n\n");
        out.push_str("Rate queries:\n");
        out.push_str(&align_columns(&[
            row(&["• /rate <base> [target]", "Get an exchange rate"]),
            row(&["• /rates <base>", "List all rates for a currency"]),
            row(&["• /currencies", "List available currencies"]),
        ]));
        out.push_str("\n\nVES shortcuts:\n");
        out.push_str(&align_columns(&[
            row(&["• /dolar", "USD/VES"]),
            row(&["• /euro", "EUR/VES"]),
            row(&["• /usdt", "USDT/VES"]),
            row(&["• /rublo", "RUB/VES"]),
            row(&["• /lira", "TRY/VES"]),
            row(&["• /yuan", "CNY/VES"]),
        ]));
        out.push_str("\n\nExamples:\n• /rate USD VES");

        return out;
    }

    let mut out = String::from("📖 Comandos de ChiguiCifras\n\n");
    out.push_str("Consultas de tasas:\n");
    out.push_str(&align_columns(&[
        row(&["• /tasa <base> [destino]", "Obtener una tasa de cambio"]),
        row(&["• /tasas <base>", "Listar todas las tasas de una moneda"]),
        row(&["• /monedas", "Listar monedas disponibles"]),
    ]));
    out.push_str("\n\nAtajos VES:\n");
    out.push_str(&align_columns(&[
        row(&["• /dolar", "USD/VES"]),
        row(&["• /euro", "EUR/VES"]),
        row(&["• /usdt", "USDT/VES"]),
        row(&["• /rublo", "RUB/VES"]),
        row(&["• /lira", "TRY/VES"]),
        row(&["• /yuan", "CNY/VES"]),
    ]));
    out.push_str("\n\nEjemplos:\n• /tasa USD VES");

    out
}

/// Formats an upstream error for the chat.
pub fn error_message(err: &crate::fxrates::Error, _lang: Language) -> String {
    format!("❌ Error: {err}")
}

/// Invalid usage reply with the locale-specific usage string.
pub fn invalid_usage_message(usage: &str, lang: Language) -> String {
    match lang {
        Language::En => format!("❌ Invalid usage.\n\nUsage: {usage}"),
        Language::Es => format!("❌ Uso inválido.\n\nUso: {usage}"),
    }
}

/// Empty result for a currency pair.
pub fn no_rates_for_pair(base: &str, target: &str, lang: Language) -> String {
    match lang {
        Language::En => format!("No rates found for {base}/{target}"),
        Language::Es => format!("No se encontraron tasas para {base}/{target}"),
    }
}

/// Empty result for a base currency.
pub fn no_rates_for_base(base: &str, lang: Language) -> String {
    match lang {
        Language::En => format!("No rates found for {base}"),
        Language::Es => format!("No se encontraron tasas para {base}"),
    }
}
