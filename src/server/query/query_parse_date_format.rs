//! Target date format translation: `dd/mm/yyyy hh:mi` style tokens into chrono
//! strftime codes. Tokens are matched longest-first at each position; any other
//! alphanumeric run is rejected so an invalid format never reaches execution.

use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};

pub fn translate_date_format(format: &str, config: &EngineConfig) -> AppResult<String> {
    let lowered = format.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(AppError::validation("date format must not be empty"));
    }
    let mut out = String::with_capacity(lowered.len() + 4);
    let mut rest = lowered.as_str();
    'scan: while let Some(ch) = rest.chars().next() {
        for (token, code) in &config.date_tokens {
            if rest.starts_with(token.as_str()) {
                out.push_str(code);
                rest = &rest[token.len()..];
                continue 'scan;
            }
        }
        if ch.is_alphanumeric() {
            let bad: String = rest.chars().take_while(|c| c.is_alphanumeric()).collect();
            let allowed: Vec<&str> = config.date_tokens.iter().map(|(t, _)| t.as_str()).collect();
            return Err(AppError::validation(format!(
                "invalid date format '{}': unknown token '{}' (allowed tokens: {})",
                format, bad, allowed.join(", ")
            )));
        }
        if ch == '%' { out.push_str("%%"); } else { out.push(ch); }
        rest = &rest[ch.len_utf8()..];
    }
    Ok(out)
}
