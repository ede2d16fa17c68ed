/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "library",
    aliases: &["l", "lib"],
    description: "Playlists, songs and albums",
  },
  Command {
    name: "search",
    aliases: &["s", "find"],
    description: "Search the catalog",
  },
  Command {
    name: "account",
    aliases: &["a", "profile", "settings"],
    description: "Profile, parental controls and artist status",
  },
  Command {
    name: "password",
    aliases: &["p", "passwd"],
    description: "Set a new password",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit maynsta",
  },
];

/// How well `input` matches `cmd`, lower is better. Exact beats prefix
/// beats substring, and at each level the name beats an alias.
fn rank(cmd: &Command, input: &str) -> Option<u32> {
  let aliases = || cmd.aliases.iter();
  if cmd.name == input {
    Some(0)
  } else if aliases().any(|a| *a == input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if aliases().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if aliases().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Commands matching `input`, best match first. Empty input lists all.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut ranked: Vec<(u32, &'static Command)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (r, cmd)))
    .collect();
  // Stable, so ties keep table order
  ranked.sort_by_key(|(r, _)| *r);
  ranked.into_iter().map(|(_, cmd)| cmd).collect()
}

/// Resolve typed input to a command name, if anything matches.
pub fn resolve(input: &str) -> Option<&'static str> {
  get_suggestions(input.trim()).first().map(|cmd| cmd.name)
}
