use crate::screens::password::PasswordError;
use crate::screens::PasswordReset;
use crate::task::{Task, TaskState};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::renderfns::Status;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
  Password,
  Confirm,
}

/// New password form
pub struct PasswordView {
  reset: PasswordReset,
  password: TextInput,
  confirm: TextInput,
  focus: Focus,
  submit: Task<Result<(), PasswordError>>,
  status: Option<Status>,
}

impl PasswordView {
  pub fn new(reset: PasswordReset) -> Self {
    Self {
      reset,
      password: TextInput::new().masked(),
      confirm: TextInput::new().masked(),
      focus: Focus::Password,
      submit: Task::idle(),
      status: None,
    }
  }

  fn submit(&mut self) {
    if self.submit.is_running() {
      return;
    }
    let reset = self.reset.clone();
    let password = self.password.value().to_string();
    let confirm = self.confirm.value().to_string();
    self.status = None;
    self.submit = Task::spawn(async move { Ok(reset.submit(&password, &confirm).await) });
  }

  fn field(&self, frame: &mut Frame, area: Rect, title: &str, input: &TextInput, focus: Focus) {
    let focused = self.focus == focus;
    let block = Block::default()
      .title(title.to_string())
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::Blue }));
    frame.render_widget(Paragraph::new(input.to_line(focused)).block(block), area);
  }
}

impl View for PasswordView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if key.code == KeyCode::Esc {
      return ViewAction::Pop;
    }
    if matches!(key.code, KeyCode::Tab | KeyCode::BackTab) {
      self.focus = match self.focus {
        Focus::Password => Focus::Confirm,
        Focus::Confirm => Focus::Password,
      };
      return ViewAction::None;
    }

    let input = match self.focus {
      Focus::Password => &mut self.password,
      Focus::Confirm => &mut self.confirm,
    };
    match input.handle_key(key) {
      InputResult::Submitted(_) => match self.focus {
        Focus::Password => self.focus = Focus::Confirm,
        Focus::Confirm => self.submit(),
      },
      InputResult::Cancelled => return ViewAction::Pop,
      InputResult::Consumed | InputResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(2),
        Constraint::Min(0),
      ])
      .split(area);

    self.field(frame, chunks[0], " New password ", &self.password, Focus::Password);
    self.field(frame, chunks[1], " Confirm password ", &self.confirm, Focus::Confirm);

    let hint = if self.submit.is_running() {
      "Updating..."
    } else {
      "enter: next/submit  tab: switch field  esc: back"
    };
    frame.render_widget(
      Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
      chunks[2],
    );
  }

  fn breadcrumb_label(&self) -> String {
    "Password".to_string()
  }

  fn is_editing(&self) -> bool {
    true
  }

  fn tick(&mut self) -> ViewAction {
    if self.submit.poll() {
      self.status = match self.submit.state() {
        TaskState::Done(Ok(())) => {
          self.password.clear();
          self.confirm.clear();
          self.focus = Focus::Password;
          Some(Status::Info("Password updated.".to_string()))
        }
        TaskState::Done(Err(e)) => Some(Status::Error(e.to_string())),
        TaskState::Failed(e) => Some(Status::Error(e.clone())),
        TaskState::Idle | TaskState::Running => None,
      };
    }
    ViewAction::None
  }

  fn status(&self) -> Option<Status> {
    self.status.clone()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "submit").with_priority(20),
      ShortcutInfo::new("tab", "switch field").with_priority(30),
      ShortcutInfo::new("esc", "back").with_priority(90),
    ]
  }
}
