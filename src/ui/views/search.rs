use crate::remote::types::SearchHistory;
use crate::screens::search::SearchResults;
use crate::screens::SearchScreen;
use crate::task::{Task, TaskState};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_duration, truncate, Status};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
  /// Browsing history or results
  List,
  Query,
  Question,
}

/// Catalog search with history and the AI helper
pub struct SearchView {
  screen: SearchScreen,
  focus: Focus,
  query: TextInput,
  question: TextInput,
  /// Whether the AI panel is open
  ai_open: bool,
  history_state: ListState,
  result_state: ListState,
  search: Task<()>,
  clear_history: Task<()>,
  ask: Task<Option<String>>,
  status: Option<Status>,
}

impl SearchView {
  pub fn new(screen: SearchScreen) -> Self {
    Self {
      screen,
      focus: Focus::Query,
      query: TextInput::new(),
      question: TextInput::new(),
      ai_open: false,
      history_state: ListState::default(),
      result_state: ListState::default(),
      search: Task::idle(),
      clear_history: Task::idle(),
      ask: Task::idle(),
      status: None,
    }
  }

  fn run_search(&mut self, text: String) {
    self.query.set_value(text.trim());
    self.result_state = ListState::default();
    let screen = self.screen.clone();
    self.search = Task::spawn(async move { screen.search(&text).await });
  }

  fn run_history_entry(&mut self, entry: SearchHistory) {
    self.query.set_value(&entry.query);
    let screen = self.screen.clone();
    self.search = Task::spawn(async move { screen.rerun(&entry).await });
  }

  fn ask_ai(&mut self, question: String) {
    let screen = self.screen.clone();
    self.ask = Task::spawn(async move { Ok(screen.ask_ai(&question).await) });
  }

  fn render_query(&self, frame: &mut Frame, area: Rect) {
    let focused = self.focus == Focus::Query;
    let color = if focused { Color::Yellow } else { Color::Blue };
    let title = if self.screen.is_searching() {
      " Search (searching...) "
    } else {
      " Search "
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(color));
    let line = if self.query.is_empty() && !focused {
      Line::styled(
        "Songs, artists or albums. Press '/' to type.",
        Style::default().fg(Color::DarkGray),
      )
    } else {
      self.query.to_line(focused)
    };
    frame.render_widget(Paragraph::new(line).block(block), area);
  }

  fn render_history(&mut self, frame: &mut Frame, area: Rect, history: &[SearchHistory]) {
    let title = if self.screen.history_is_local() {
      " Recent searches (syncing) "
    } else {
      " Recent searches "
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if history.is_empty() {
      let paragraph = Paragraph::new("Search for your favorite songs, artists and albums.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }
    ensure_valid_selection(&mut self.history_state, history.len());

    let items: Vec<ListItem> = history
      .iter()
      .map(|h| {
        ListItem::new(Line::from(vec![
          Span::raw(truncate(&h.query, 40)),
          Span::styled(
            format!("  {}", h.searched_at.format("%Y-%m-%d %H:%M")),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();
    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.history_state);
  }

  fn render_results(&mut self, frame: &mut Frame, area: Rect, results: &SearchResults) {
    let block = Block::default()
      .title(format!(
        " Results ({} songs, {} albums) ",
        results.songs.len(),
        results.albums.len()
      ))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if results.songs.is_empty() && results.albums.is_empty() {
      let paragraph = Paragraph::new(format!("No results for \"{}\".", self.query.value()))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let mut items: Vec<ListItem> = Vec::new();
    for song in &results.songs {
      items.push(ListItem::new(Line::from(vec![
        Span::styled("song   ", Style::default().fg(Color::Magenta)),
        Span::raw(truncate(&song.title, 36)),
        Span::styled(
          format!("  {}", song.artist_name().unwrap_or("Unknown")),
          Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
          format!("  {}", format_duration(song.duration)),
          Style::default().fg(Color::DarkGray),
        ),
      ])));
    }
    for album in &results.albums {
      items.push(ListItem::new(Line::from(vec![
        Span::styled("album  ", Style::default().fg(Color::Green)),
        Span::raw(truncate(&album.title, 36)),
        Span::styled(
          format!(
            "  {}",
            album.artist.as_ref().map(|a| a.name()).unwrap_or("Unknown")
          ),
          Style::default().fg(Color::DarkGray),
        ),
      ])));
    }
    ensure_valid_selection(&mut self.result_state, items.len());

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.result_state);
  }

  fn render_ai(&self, frame: &mut Frame, area: Rect) {
    let focused = self.focus == Focus::Question;
    let block = Block::default()
      .title(" Ask about these results ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::Blue }));

    let mut prompt = vec![Span::styled("? ", Style::default().fg(Color::Yellow))];
    prompt.extend(self.question.to_line(focused).spans);
    let mut lines = vec![Line::from(prompt)];
    if self.screen.is_asking_ai() {
      lines.push(Line::styled("thinking...", Style::default().fg(Color::DarkGray)));
    } else if let Some(response) = self.screen.ai_response() {
      lines.push(Line::raw(""));
      lines.push(Line::raw(response));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
  }

  fn handle_input_key(&mut self, key: KeyEvent) {
    match self.focus {
      Focus::Query => match self.query.handle_key(key) {
        InputResult::Submitted(text) => {
          self.focus = Focus::List;
          self.run_search(text);
        }
        InputResult::Cancelled => self.focus = Focus::List,
        InputResult::Consumed | InputResult::NotHandled => {}
      },
      Focus::Question => match self.question.handle_key(key) {
        InputResult::Submitted(question) => {
          self.question.clear();
          self.focus = Focus::List;
          self.ask_ai(question);
        }
        InputResult::Cancelled => self.focus = Focus::List,
        InputResult::Consumed | InputResult::NotHandled => {}
      },
      Focus::List => {}
    }
  }
}

impl View for SearchView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.focus != Focus::List {
      self.handle_input_key(key);
      return ViewAction::None;
    }

    let has_results = self.screen.results().is_some();
    match key.code {
      KeyCode::Char('/') => self.focus = Focus::Query,
      KeyCode::Char('j') | KeyCode::Down => {
        if has_results {
          self.result_state.select_next();
        } else {
          self.history_state.select_next();
        }
      }
      KeyCode::Char('k') | KeyCode::Up => {
        if has_results {
          self.result_state.select_previous();
        } else {
          self.history_state.select_previous();
        }
      }
      KeyCode::Enter if !has_results => {
        let history = self.screen.history();
        if let Some(entry) = self
          .history_state
          .selected()
          .and_then(|i| history.get(i))
          .cloned()
        {
          self.run_history_entry(entry);
        }
      }
      KeyCode::Char('x') if !self.clear_history.is_running() => {
        let screen = self.screen.clone();
        self.clear_history = Task::spawn(async move { screen.clear_history().await });
      }
      KeyCode::Char('a') if has_results => {
        self.ai_open = true;
        self.focus = Focus::Question;
      }
      KeyCode::Char('c') => {
        self.screen.clear();
        self.query.clear();
        self.question.clear();
        self.ai_open = false;
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let results = self.screen.results();
    let show_ai = self.ai_open && results.is_some();

    let mut constraints = vec![Constraint::Length(3), Constraint::Min(3)];
    if show_ai {
      constraints.push(Constraint::Length(7));
    }
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints(constraints)
      .split(area);

    self.render_query(frame, chunks[0]);
    match &results {
      Some(results) => self.render_results(frame, chunks[1], results),
      None => {
        let history = self.screen.history();
        self.render_history(frame, chunks[1], &history);
      }
    }
    if show_ai {
      self.render_ai(frame, chunks[2]);
    }
  }

  fn breadcrumb_label(&self) -> String {
    let query = self.screen.query();
    if query.is_empty() {
      "Search".to_string()
    } else {
      format!("Search [{}]", truncate(&query, 20))
    }
  }

  fn is_editing(&self) -> bool {
    self.focus != Focus::List
  }

  fn tick(&mut self) -> ViewAction {
    if self.search.poll() {
      if let Some(e) = self.search.error() {
        self.status = Some(Status::Error(e.to_string()));
      }
    }
    if self.clear_history.poll() {
      self.status = Some(match self.clear_history.state() {
        TaskState::Failed(e) => Status::Error(format!("Could not clear history: {}", e)),
        _ => Status::Info("History cleared".to_string()),
      });
    }
    self.ask.poll();
    ViewAction::None
  }

  fn status(&self) -> Option<Status> {
    self.status.clone()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("a", "ask AI").with_priority(30),
      ShortcutInfo::new("x", "clear history").with_priority(40),
      ShortcutInfo::new("c", "clear").with_priority(50),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
