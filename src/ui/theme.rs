use std::sync::OnceLock;
use owo_colors::{OwoColorize, Style};

static THEME: OnceLock<Theme> = OnceLock::new();

/// What a piece of terminal output is, independent of how it is colored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Header,
    Success,
    Error,
    Warn,
    Info,
    Dim,
    Muted,
    /// Table and column names
    Name,
    /// Generated SQL
    Sql,
}

/// Terminal palette; plain when stdout is not a terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    colored: bool,
}

impl Theme {
    pub fn detect() -> Self {
        Self::for_terminal(console::Term::stdout().is_term())
    }

    pub fn for_terminal(colored: bool) -> Self {
        Self { colored }
    }

    pub fn is_colored(&self) -> bool {
        self.colored
    }

    pub fn style(&self, role: Role) -> Style {
        if !self.colored {
            return Style::new();
        }
        match role {
            Role::Header => Style::new().cyan().bold(),
            Role::Success => Style::new().green().bold(),
            Role::Error => Style::new().red().bold(),
            Role::Warn => Style::new().yellow().bold(),
            Role::Info => Style::new().magenta(),
            Role::Dim => Style::new().white().dimmed(),
            Role::Muted => Style::new().bright_black(),
            Role::Name => Style::new().blue().bold(),
            Role::Sql => Style::new().green(),
        }
    }

    pub fn paint(&self, text: &str, role: Role) -> String {
        text.style(self.style(role)).to_string()
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

/// Shorthand for `theme().paint(text, role)`
pub fn paint(text: &str, role: Role) -> String {
    theme().paint(text, role)
}
