use crate::remote::types::{Album, Playlist};
use crate::screens::library::{SongRow, ViewMode};
use crate::screens::LibraryScreen;
use crate::task::{Task, TaskState};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{explicit_badge, format_duration, song_style, truncate, Status};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

const GRID_CELL_WIDTH: u16 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
  Playlists,
  Songs,
  Albums,
}

impl Pane {
  fn next(self) -> Self {
    match self {
      Pane::Playlists => Pane::Songs,
      Pane::Songs => Pane::Albums,
      Pane::Albums => Pane::Playlists,
    }
  }

  fn previous(self) -> Self {
    self.next().next()
  }
}

/// Playlists, songs and albums of the user
pub struct LibraryView {
  screen: LibraryScreen,
  pane: Pane,
  playlist_state: ListState,
  song_state: ListState,
  album_state: ListState,
  /// Name of the playlist being created
  new_playlist: Option<TextInput>,
  refresh: Task<()>,
  create: Task<()>,
  status: Option<Status>,
}

impl LibraryView {
  pub fn new(screen: LibraryScreen) -> Self {
    let refresh = {
      let screen = screen.clone();
      Task::spawn(async move { screen.refresh().await })
    };
    Self {
      screen,
      pane: Pane::Songs,
      playlist_state: ListState::default(),
      song_state: ListState::default(),
      album_state: ListState::default(),
      new_playlist: None,
      refresh,
      create: Task::idle(),
      status: None,
    }
  }

  fn refetch(&mut self) {
    if self.refresh.is_running() {
      return;
    }
    let screen = self.screen.clone();
    self.refresh = Task::spawn(async move { screen.refresh().await });
  }

  fn create_playlist(&mut self, name: String) {
    let screen = self.screen.clone();
    self.create = Task::spawn(async move { screen.create_playlist(&name, None).await });
  }

  fn selected_state(&mut self) -> &mut ListState {
    match self.pane {
      Pane::Playlists => &mut self.playlist_state,
      Pane::Songs => &mut self.song_state,
      Pane::Albums => &mut self.album_state,
    }
  }

  fn block(&self, title: String, pane: Pane) -> Block<'static> {
    let color = if self.pane == pane {
      Color::Cyan
    } else {
      Color::Blue
    };
    Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(color))
  }

  fn render_empty(&self, frame: &mut Frame, area: Rect, block: Block, message: &str) {
    let paragraph = Paragraph::new(message)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
  }

  fn render_playlists(&mut self, frame: &mut Frame, area: Rect, playlists: &[Playlist]) {
    let block = self.block(format!(" Playlists ({}) ", playlists.len()), Pane::Playlists);
    if playlists.is_empty() {
      self.render_empty(frame, area, block, "No playlists yet. Press 'n' to create one.");
      return;
    }
    ensure_valid_selection(&mut self.playlist_state, playlists.len());

    let width = area.width.saturating_sub(6) as usize;
    let items: Vec<ListItem> = playlists
      .iter()
      .map(|p| ListItem::new(truncate(&p.name, width)))
      .collect();
    let list = List::new(items)
      .block(block)
      .highlight_style(highlight())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.playlist_state);
  }

  fn song_line(row: &SongRow) -> Line<'static> {
    let artist = row.song.artist_name().unwrap_or("Unknown");
    let mut spans = vec![
      explicit_badge(row.explicit_warning),
      Span::raw(" "),
      Span::styled(truncate(&row.song.title, 36), song_style(row.blocked)),
      Span::styled(
        format!("  {}", truncate(artist, 24)),
        Style::default().fg(Color::DarkGray),
      ),
      Span::styled(
        format!("  {}", format_duration(row.song.duration)),
        Style::default().fg(Color::DarkGray),
      ),
    ];
    if row.blocked {
      spans.push(Span::styled("  blocked", Style::default().fg(Color::Red)));
    }
    Line::from(spans)
  }

  fn album_line(album: &Album) -> Line<'static> {
    let artist = album.artist.as_ref().map(|a| a.name()).unwrap_or("Unknown");
    Line::from(vec![
      Span::raw(truncate(&album.title, 36)),
      Span::styled(
        format!("  {}", truncate(artist, 24)),
        Style::default().fg(Color::DarkGray),
      ),
    ])
  }

  fn render_songs(&mut self, frame: &mut Frame, area: Rect, songs: &[SongRow], mode: ViewMode) {
    let block = self.block(format!(" Songs ({}) ", songs.len()), Pane::Songs);
    if songs.is_empty() {
      self.render_empty(frame, area, block, "No songs in your library yet.");
      return;
    }
    ensure_valid_selection(&mut self.song_state, songs.len());

    match mode {
      ViewMode::List => {
        let items: Vec<ListItem> = songs
          .iter()
          .map(|row| ListItem::new(Self::song_line(row)))
          .collect();
        let list = List::new(items)
          .block(block)
          .highlight_style(highlight())
          .highlight_symbol("> ");
        frame.render_stateful_widget(list, area, &mut self.song_state);
      }
      ViewMode::Grid => {
        let cells: Vec<(String, Style)> = songs
          .iter()
          .map(|row| {
            let badge = if row.explicit_warning { "[E] " } else { "" };
            (format!("{}{}", badge, row.song.title), song_style(row.blocked))
          })
          .collect();
        render_grid(frame, area, block, &cells, self.song_state.selected());
      }
    }
  }

  fn render_albums(&mut self, frame: &mut Frame, area: Rect, albums: &[Album], mode: ViewMode) {
    let block = self.block(format!(" Albums ({}) ", albums.len()), Pane::Albums);
    if albums.is_empty() {
      self.render_empty(frame, area, block, "No albums in your library yet.");
      return;
    }
    ensure_valid_selection(&mut self.album_state, albums.len());

    match mode {
      ViewMode::List => {
        let items: Vec<ListItem> = albums
          .iter()
          .map(|a| ListItem::new(Self::album_line(a)))
          .collect();
        let list = List::new(items)
          .block(block)
          .highlight_style(highlight())
          .highlight_symbol("> ");
        frame.render_stateful_widget(list, area, &mut self.album_state);
      }
      ViewMode::Grid => {
        let cells: Vec<(String, Style)> = albums
          .iter()
          .map(|a| (a.title.clone(), Style::default()))
          .collect();
        render_grid(frame, area, block, &cells, self.album_state.selected());
      }
    }
  }

  fn render_new_playlist(&self, frame: &mut Frame, area: Rect) {
    let Some(input) = &self.new_playlist else {
      return;
    };
    let popup = Rect::new(area.x + 2, area.y + 1, area.width.min(50), 3).intersection(area);
    frame.render_widget(ratatui::widgets::Clear, popup);
    let block = Block::default()
      .title(" New playlist ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));
    frame.render_widget(Paragraph::new(input.to_line(true)).block(block), popup);
  }
}

fn highlight() -> Style {
  Style::default()
    .bg(Color::DarkGray)
    .add_modifier(Modifier::BOLD)
}

/// Lay `cells` out left to right in fixed-width columns.
fn render_grid(
  frame: &mut Frame,
  area: Rect,
  block: Block,
  cells: &[(String, Style)],
  selected: Option<usize>,
) {
  let inner_width = area.width.saturating_sub(2);
  let columns = (inner_width / GRID_CELL_WIDTH).max(1) as usize;
  let text_width = GRID_CELL_WIDTH.saturating_sub(2) as usize;

  let lines: Vec<Line> = cells
    .chunks(columns)
    .enumerate()
    .map(|(row, chunk)| {
      let spans: Vec<Span> = chunk
        .iter()
        .enumerate()
        .map(|(col, (text, style))| {
          let index = row * columns + col;
          let style = if selected == Some(index) {
            style.patch(highlight())
          } else {
            *style
          };
          Span::styled(
            format!(" {:<width$} ", truncate(text, text_width), width = text_width),
            style,
          )
        })
        .collect();
      Line::from(spans)
    })
    .collect();

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

impl View for LibraryView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(input) = &mut self.new_playlist {
      match input.handle_key(key) {
        InputResult::Submitted(name) => {
          self.new_playlist = None;
          self.create_playlist(name);
        }
        InputResult::Cancelled => self.new_playlist = None,
        InputResult::Consumed | InputResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Tab => self.pane = self.pane.next(),
      KeyCode::BackTab => self.pane = self.pane.previous(),
      KeyCode::Char('j') | KeyCode::Down => self.selected_state().select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.selected_state().select_previous(),
      KeyCode::Char('v') => {
        self.screen.toggle_view_mode();
      }
      KeyCode::Char('r') => self.refetch(),
      KeyCode::Char('n') => self.new_playlist = Some(TextInput::new()),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let playlists = self.screen.playlists();
    let songs = self.screen.songs();
    let albums = self.screen.albums();
    let mode = self.screen.view_mode();

    let columns = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(28), Constraint::Min(20)])
      .split(area);
    let right = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
      .split(columns[1]);

    self.render_playlists(frame, columns[0], &playlists);
    self.render_songs(frame, right[0], &songs, mode);
    self.render_albums(frame, right[1], &albums, mode);
    self.render_new_playlist(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    match self.screen.view_mode() {
      ViewMode::List => "Library".to_string(),
      ViewMode::Grid => "Library [grid]".to_string(),
    }
  }

  fn is_editing(&self) -> bool {
    self.new_playlist.is_some()
  }

  fn tick(&mut self) -> ViewAction {
    if self.refresh.poll() {
      if let Some(e) = self.refresh.error() {
        self.status = Some(Status::Error(format!("Refresh failed: {}", e)));
      }
    }
    if self.create.poll() {
      self.status = Some(match self.create.state() {
        TaskState::Failed(e) => Status::Error(e.clone()),
        _ => Status::Info("Playlist created".to_string()),
      });
    }
    ViewAction::None
  }

  fn status(&self) -> Option<Status> {
    if self.refresh.is_running() || self.screen.is_loading() {
      return Some(Status::Info("loading...".to_string()));
    }
    self
      .status
      .clone()
      .or_else(|| self.screen.last_error().map(Status::Error))
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("tab", "pane").with_priority(20),
      ShortcutInfo::new("n", "new playlist").with_priority(30),
      ShortcutInfo::new("v", "list/grid").with_priority(40),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
