use once_cell::sync::Lazy;

pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime")
});

pub fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    RUNTIME.block_on(fut)
}

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Render an RFC 3339 timestamp in local time; anything else is shown as-is.
pub fn format_timestamp(raw: Option<&str>) -> String {
    match raw {
        Some(s) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| s.to_string()),
        None => "-".to_string(),
    }
}

pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_scheme_and_strips_trailing_slash() {
        assert_eq!(normalize_url(" admin.freespeek.app/ "), "https://admin.freespeek.app");
        assert_eq!(normalize_url("http://localhost:5000/api/"), "http://localhost:5000/api");
    }

    #[test]
    fn timestamps_fall_back_to_raw_text() {
        assert_eq!(format_timestamp(None), "-");
        assert_eq!(format_timestamp(Some("yesterday")), "yesterday");
        assert_eq!(format_timestamp(Some("2024-05-01T10:00:00Z")).len(), 16);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héll…");
        assert_eq!(truncate("short", 10), "short");
    }
}
