use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
    Warning,
    Info,
}

/// Operator-facing message; the terminal's stand-in for a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: Level::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: Level::Error, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: Level::Warning, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { level: Level::Info, message: message.into() }
    }

    pub fn render(&self) -> String {
        let tag = match self.level {
            Level::Success => "✔",
            Level::Error => "✖",
            Level::Warning => "!",
            Level::Info => "i",
        };
        format!("[{tag}] {}", self.message)
    }
}

pub fn show(n: &Notification) {
    debug!("notification: {n:?}");
    eprintln!("{}", n.render());
}
