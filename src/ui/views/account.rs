use std::path::PathBuf;

use crate::screens::account::{AccountForm, Section, PIN_LENGTH};
use crate::screens::AccountScreen;
use crate::task::{Task, TaskState};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::renderfns::{truncate, Status};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  DisplayName,
  AvatarFile,
  SaveProfile,
  ParentalEnabled,
  Pin,
  MusicVideos,
  Explicit,
  SaveParental,
  IsArtist,
  ArtistName,
  ArtistBio,
  SaveArtist,
  SignOut,
}

const FIELDS: [Field; 13] = [
  Field::DisplayName,
  Field::AvatarFile,
  Field::SaveProfile,
  Field::ParentalEnabled,
  Field::Pin,
  Field::MusicVideos,
  Field::Explicit,
  Field::SaveParental,
  Field::IsArtist,
  Field::ArtistName,
  Field::ArtistBio,
  Field::SaveArtist,
  Field::SignOut,
];

impl Field {
  fn label(self) -> &'static str {
    match self {
      Field::DisplayName => "Display name",
      Field::AvatarFile => "Avatar file",
      Field::SaveProfile => "[ Save profile ]",
      Field::ParentalEnabled => "Parental controls",
      Field::Pin => "PIN",
      Field::MusicVideos => "Music videos",
      Field::Explicit => "Explicit content",
      Field::SaveParental => "[ Save parental controls ]",
      Field::IsArtist => "Artist profile",
      Field::ArtistName => "Artist name",
      Field::ArtistBio => "Artist bio",
      Field::SaveArtist => "[ Save artist status ]",
      Field::SignOut => "[ Sign out ]",
    }
  }

  fn section(self) -> Option<Section> {
    match self {
      Field::DisplayName | Field::AvatarFile | Field::SaveProfile => Some(Section::Profile),
      Field::ParentalEnabled
      | Field::Pin
      | Field::MusicVideos
      | Field::Explicit
      | Field::SaveParental => Some(Section::Parental),
      Field::IsArtist | Field::ArtistName | Field::ArtistBio | Field::SaveArtist => {
        Some(Section::Artist)
      }
      Field::SignOut => None,
    }
  }

  fn is_text(self) -> bool {
    matches!(
      self,
      Field::DisplayName | Field::AvatarFile | Field::Pin | Field::ArtistName | Field::ArtistBio
    )
  }

  fn text(self, form: &AccountForm) -> String {
    match self {
      Field::DisplayName => form.display_name.clone(),
      Field::AvatarFile => form
        .avatar_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default(),
      Field::Pin => form.parental_pin.clone(),
      Field::ArtistName => form.artist_name.clone(),
      Field::ArtistBio => form.artist_bio.clone(),
      _ => String::new(),
    }
  }

  fn flag(self, form: &AccountForm) -> Option<bool> {
    match self {
      Field::ParentalEnabled => Some(form.parental_enabled),
      Field::MusicVideos => Some(form.music_videos_enabled),
      Field::Explicit => Some(form.explicit_enabled),
      Field::IsArtist => Some(form.is_artist),
      _ => None,
    }
  }
}

/// Profile, parental control and artist settings
pub struct AccountView {
  screen: AccountScreen,
  selected: usize,
  editing: Option<(Field, TextInput)>,
  save: Task<()>,
  sign_out: Task<()>,
  status: Option<Status>,
}

impl AccountView {
  pub fn new(screen: AccountScreen) -> Self {
    Self {
      screen,
      selected: 0,
      editing: None,
      save: Task::idle(),
      sign_out: Task::idle(),
      status: None,
    }
  }

  fn field(&self) -> Field {
    FIELDS[self.selected]
  }

  fn start_editing(&mut self, field: Field) {
    let value = field.text(&self.screen.form());
    let input = if field == Field::Pin {
      TextInput::with_value(&value).max_len(PIN_LENGTH)
    } else {
      TextInput::with_value(&value)
    };
    self.editing = Some((field, input));
  }

  fn commit(&self, field: Field, value: String) {
    match field {
      Field::Pin => self.screen.set_parental_pin(&value),
      Field::DisplayName => self.screen.edit(|f| f.display_name = value),
      Field::AvatarFile => self.screen.edit(|f| {
        let path = value.trim();
        f.avatar_file = (!path.is_empty()).then(|| PathBuf::from(path));
      }),
      Field::ArtistName => self.screen.edit(|f| f.artist_name = value),
      Field::ArtistBio => self.screen.edit(|f| f.artist_bio = value),
      _ => {}
    }
  }

  fn toggle(&self, field: Field) {
    self.screen.edit(|f| match field {
      Field::ParentalEnabled => f.parental_enabled = !f.parental_enabled,
      Field::MusicVideos => f.music_videos_enabled = !f.music_videos_enabled,
      Field::Explicit => f.explicit_enabled = !f.explicit_enabled,
      Field::IsArtist => f.is_artist = !f.is_artist,
      _ => {}
    });
  }

  fn activate(&mut self) {
    let field = self.field();
    if field.is_text() {
      self.start_editing(field);
      return;
    }
    if field.flag(&self.screen.form()).is_some() {
      self.toggle(field);
      return;
    }
    if self.save.is_running() || self.sign_out.is_running() {
      return;
    }

    let screen = self.screen.clone();
    match field {
      Field::SaveProfile => {
        self.save = Task::spawn(async move { screen.save_profile().await });
      }
      Field::SaveParental => {
        self.save = Task::spawn(async move { screen.save_parental().await });
      }
      Field::SaveArtist => {
        self.save = Task::spawn(async move { screen.save_artist().await });
      }
      Field::SignOut => {
        self.sign_out = Task::spawn(async move { screen.sign_out().await });
      }
      _ => {}
    }
  }

  fn row(&self, index: usize, field: Field, form: &AccountForm) -> Line<'static> {
    let selected = index == self.selected;
    let marker = if selected { "> " } else { "  " };
    let label_style = if selected {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default()
    };

    // Parental sub-settings only apply when parental control is on
    let inactive = matches!(field, Field::Pin | Field::MusicVideos | Field::Explicit)
      && !form.parental_enabled;
    let value_style = if inactive {
      Style::default().fg(Color::DarkGray)
    } else {
      Style::default().fg(Color::White)
    };

    let mut spans = vec![
      Span::raw(marker),
      Span::styled(format!("{:<20}", field.label()), label_style),
    ];

    match &self.editing {
      Some((editing, input)) if *editing == field => {
        spans.extend(input.to_line(true).spans);
      }
      _ => {
        if let Some(on) = field.flag(form) {
          spans.push(Span::styled(if on { "[x]" } else { "[ ]" }, value_style));
        } else if field.is_text() {
          let text = field.text(form);
          let shown = if text.is_empty() {
            Span::styled("(empty)", Style::default().fg(Color::DarkGray))
          } else {
            Span::styled(truncate(&text, 48), value_style)
          };
          spans.push(shown);
        }
      }
    }

    let is_save = matches!(
      field,
      Field::SaveProfile | Field::SaveParental | Field::SaveArtist
    );
    if is_save && self.screen.saving().is_some() && self.screen.saving() == field.section() {
      spans.push(Span::styled("  saving...", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
  }
}

impl View for AccountView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some((field, input)) = &mut self.editing {
      let field = *field;
      match input.handle_key(key) {
        InputResult::Submitted(value) => {
          self.editing = None;
          self.commit(field, value);
        }
        InputResult::Cancelled => self.editing = None,
        InputResult::Consumed | InputResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.selected = (self.selected + 1).min(FIELDS.len() - 1);
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.selected = self.selected.saturating_sub(1);
      }
      KeyCode::Enter | KeyCode::Char(' ') => self.activate(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let profile = self.screen.profile();
    let form = self.screen.form();

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(5),
        Constraint::Length(7),
        Constraint::Length(6),
        Constraint::Length(3),
        Constraint::Min(0),
      ])
      .split(area);

    let avatar = profile
      .as_ref()
      .and_then(|p| p.avatar_url.clone())
      .unwrap_or_else(|| "no avatar".to_string());
    let titles = [
      format!(" Profile ({}) ", truncate(&avatar, 40)),
      " Parental controls ".to_string(),
      " Artist ".to_string(),
      " Session ".to_string(),
    ];
    let sections = [
      Some(Section::Profile),
      Some(Section::Parental),
      Some(Section::Artist),
      None,
    ];

    for (i, (title, section)) in titles.iter().zip(sections).enumerate() {
      let lines: Vec<Line> = FIELDS
        .iter()
        .enumerate()
        .filter(|(_, f)| f.section() == section)
        .map(|(index, f)| self.row(index, *f, &form))
        .collect();
      let block = Block::default()
        .title(title.clone())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
      frame.render_widget(Paragraph::new(lines).block(block), chunks[i]);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Account".to_string()
  }

  fn is_editing(&self) -> bool {
    self.editing.is_some()
  }

  fn tick(&mut self) -> ViewAction {
    if self.save.poll() {
      self.status = Some(match self.save.state() {
        TaskState::Failed(e) => Status::Error(format!("Save failed: {}", e)),
        _ => Status::Info("Saved".to_string()),
      });
    }
    if self.sign_out.poll() {
      match self.sign_out.state() {
        TaskState::Failed(e) => {
          self.status = Some(Status::Error(format!("Sign out failed: {}", e)));
        }
        _ => return ViewAction::Quit,
      }
    }
    ViewAction::None
  }

  fn status(&self) -> Option<Status> {
    self.status.clone()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("enter", "edit/toggle/save").with_priority(20),
      ShortcutInfo::new("esc", "cancel edit").when_active(),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
