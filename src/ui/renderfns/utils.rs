use ratatui::prelude::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Format a song length in seconds as `m:ss`
pub fn format_duration(seconds: Option<u32>) -> String {
  match seconds {
    Some(s) => format!("{}:{:02}", s / 60, s % 60),
    None => "-:--".to_string(),
  }
}

/// Badge for explicit songs when the viewer wants warnings
pub fn explicit_badge(show: bool) -> Span<'static> {
  if show {
    Span::styled(" E ", Style::default().fg(Color::Black).bg(Color::Red))
  } else {
    Span::raw("   ")
  }
}

/// Style of a song row that may be blocked by parental control
pub fn song_style(blocked: bool) -> Style {
  if blocked {
    Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
  } else {
    Style::default()
  }
}
