use ratatui::style::{Color, Style};
use ratatui::text::Span;
use std::collections::HashMap;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;

const THEME: &str = "base16-ocean.dark";

/// Syntax highlighting state, loaded once and shared by every file.
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
    /// Path → syntax name, so the extension lookup runs once per file
    syntaxes: HashMap<String, String>,
}

impl Highlighter {
    pub fn new() -> Self {
        let mut themes = ThemeSet::load_defaults();
        let theme = themes.themes.remove(THEME).unwrap_or_default();
        Highlighter {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
            syntaxes: HashMap::new(),
        }
    }

    fn syntax_name(&mut self, path: &str) -> String {
        if let Some(name) = self.syntaxes.get(path) {
            return name.clone();
        }
        let name = self
            .syntax_set
            .find_syntax_for_file(path)
            .ok()
            .flatten()
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
            .name
            .clone();
        self.syntaxes.insert(path.to_string(), name.clone());
        name
    }

    /// Highlight a piece of one diff line, layering syntax colors over
    /// `base_style` so the add/delete background survives.
    pub fn highlight(&mut self, text: &str, path: &str, base_style: Style) -> Vec<Span<'static>> {
        if text.is_empty() {
            return Vec::new();
        }
        let name = self.syntax_name(path);
        let syntax = self
            .syntax_set
            .find_syntax_by_name(&name)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let mut lines = HighlightLines::new(syntax, &self.theme);

        // syntect wants the trailing newline
        let input = format!("{}\n", text);
        match lines.highlight_line(&input, &self.syntax_set) {
            Ok(ranges) => ranges
                .into_iter()
                .filter_map(|(style, piece)| {
                    let piece = piece.trim_end_matches('\n');
                    if piece.is_empty() {
                        return None;
                    }
                    let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);
                    Some(Span::styled(piece.to_string(), base_style.fg(fg)))
                })
                .collect(),
            Err(e) => {
                log::debug!("highlighting {} failed: {}", path, e);
                vec![Span::styled(text.to_string(), base_style)]
            }
        }
    }
}
