//! Placeholder substitution for email templates.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::api::models::{EmailTemplate, Recipient};
use crate::app::AppConfig;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern compiles"));

static RELATIVE_SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"src="(/[^"]*)""#).expect("src pattern compiles"));

/// Placeholder names used in `text`, in order of first use.
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Fill `{{name}}`, `{{email}}` and `{{status}}` for one recipient. Unknown placeholders are left in place.
pub fn render(text: &str, recipient: &Recipient) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| match caps[1].to_ascii_lowercase().as_str() {
            "name" | "recipient_name" | "recipientname" => recipient.name.clone(),
            "email" => recipient.email.clone(),
            "status" => recipient.status.to_string(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Point root-relative image sources at the backend that serves template assets.
pub fn resolve_assets(html: &str, config: &AppConfig) -> String {
    RELATIVE_SRC_RE
        .replace_all(html, |caps: &Captures| format!("src=\"{}\"", config.asset(&caps[1])))
        .into_owned()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

pub fn preview(template: &EmailTemplate, recipient: &Recipient, config: &AppConfig) -> RenderedEmail {
    let mut body = render(&template.body, recipient);
    if template.is_html {
        body = resolve_assets(&body, config);
    }
    RenderedEmail { subject: render(&template.subject, recipient), body }
}
