use crate::commands;
use crate::screens::library::LibrarySnapshot;
use crate::screens::search::SearchSnapshot;
use crate::screens::{AccountScreen, Context, LibraryScreen, PasswordReset, SearchScreen};
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::Status;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{AccountView, LibraryView, PasswordView, SearchView};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{info, warn};

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command palette
  command: CommandInput,

  /// Services and cache of the signed-in session
  ctx: Context,

  /// Header title
  title: String,

  /// Email (or id) of the signed-in user
  account: String,

  /// App-level message, e.g. an unknown command
  status: Option<Status>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  /// Build the app with `start` (a command name or alias) as the root view.
  pub fn new(ctx: Context, title: String, account: String, start: &str) -> Result<Self> {
    let name = commands::resolve(start)
      .filter(|name| *name != "quit")
      .ok_or_else(|| eyre!("Unknown screen: {}", start))?;

    let mut app = Self {
      view_stack: Vec::new(),
      command: CommandInput::new(),
      ctx,
      title,
      account,
      status: None,
      should_quit: false,
    };
    let root = app.open(name)?;
    app.view_stack.push(root);
    Ok(app)
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(100));

    // Main loop
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    info!("Exited");
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        let action = match self.view_stack.last_mut() {
          Some(view) => view.tick(),
          None => ViewAction::None,
        };
        self.apply(action);
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // Text entry in the view gets every key, including `:`
    let editing = self.current_view().is_some_and(|v| v.is_editing());
    if self.command.is_active() || !editing {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(name)) => {
          self.execute_command(name);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(input)) => {
          self.status = Some(Status::Error(format!("Unknown command: {}", input)));
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Quit => self.should_quit = true,
    }
  }

  /// Build the view for a command name.
  fn open(&self, name: &str) -> Result<Box<dyn View>> {
    let ctx = self.ctx.clone();
    let view: Box<dyn View> = match name {
      "library" => Box::new(LibraryView::new(LibraryScreen::new(
        ctx,
        LibrarySnapshot::default(),
      )?)),
      "search" => Box::new(SearchView::new(SearchScreen::new(
        ctx,
        SearchSnapshot::default(),
      )?)),
      "account" => Box::new(AccountView::new(AccountScreen::new(ctx, None)?)),
      "password" => Box::new(PasswordView::new(PasswordReset::new(ctx.auth))),
      other => return Err(eyre!("Unknown screen: {}", other)),
    };
    Ok(view)
  }

  fn execute_command(&mut self, name: &str) {
    self.status = None;
    if name == "quit" {
      self.should_quit = true;
      return;
    }

    match self.open(name) {
      // The password form stacks on whatever is open
      Ok(view) if name == "password" => self.view_stack.push(view),
      Ok(view) => {
        self.view_stack.clear();
        self.view_stack.push(view);
      }
      Err(e) => {
        warn!(command = name, error = %e, "Could not open screen");
        self.status = Some(Status::Error(e.to_string()));
      }
    }
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn account(&self) -> &str {
    &self.account
  }

  /// The app's own message, else the current view's.
  pub fn status(&self) -> Option<Status> {
    self
      .status
      .clone()
      .or_else(|| self.current_view().and_then(|v| v.status()))
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
