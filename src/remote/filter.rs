//! Typed query values rendered to the store's REST query parameters.
//!
//! The store speaks the PostgREST dialect: every filter becomes a
//! `column=operator.value` pair, alternatives are grouped in `or=(...)`,
//! ordering is `order=column.direction` and the row cap is `limit=n`.

/// Sort direction for an ordered select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Asc,
  Desc,
}

impl Direction {
  fn as_str(self) -> &'static str {
    match self {
      Direction::Asc => "asc",
      Direction::Desc => "desc",
    }
  }
}

/// A single row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
  /// Column equals value
  Eq { column: String, value: String },
  /// Case-insensitive pattern match (`%` is the wildcard)
  ILike { column: String, pattern: String },
  /// Column is not null
  NotNull { column: String },
  /// At least one of the inner filters matches
  Or(Vec<Filter>),
}

impl Filter {
  pub fn eq(column: &str, value: impl ToString) -> Self {
    Filter::Eq {
      column: column.to_string(),
      value: value.to_string(),
    }
  }

  pub fn ilike(column: &str, pattern: impl ToString) -> Self {
    Filter::ILike {
      column: column.to_string(),
      pattern: pattern.to_string(),
    }
  }

  /// Substring match, case-insensitive.
  pub fn contains(column: &str, text: &str) -> Self {
    Self::ilike(column, format!("%{}%", text))
  }

  pub fn not_null(column: &str) -> Self {
    Filter::NotNull {
      column: column.to_string(),
    }
  }

  /// Render as a top-level query parameter.
  pub fn to_param(&self) -> (String, String) {
    match self {
      Filter::Eq { column, value } => (column.clone(), format!("eq.{}", value)),
      Filter::ILike { column, pattern } => (column.clone(), format!("ilike.{}", pattern)),
      Filter::NotNull { column } => (column.clone(), "not.is.null".to_string()),
      Filter::Or(inner) => ("or".to_string(), format!("({})", join_inner(inner))),
    }
  }

  /// Render as an element of an `or=(...)` list.
  fn to_inner(&self) -> String {
    match self {
      Filter::Eq { column, value } => format!("{}.eq.{}", column, quote_reserved(value)),
      Filter::ILike { column, pattern } => {
        format!("{}.ilike.{}", column, quote_reserved(pattern))
      }
      Filter::NotNull { column } => format!("{}.not.is.null", column),
      Filter::Or(inner) => format!("or({})", join_inner(inner)),
    }
  }
}

fn join_inner(filters: &[Filter]) -> String {
  filters
    .iter()
    .map(Filter::to_inner)
    .collect::<Vec<_>>()
    .join(",")
}

/// Values inside an `or` list must be double-quoted when they contain
/// list punctuation.
fn quote_reserved(value: &str) -> String {
  if value.contains(&[',', '(', ')', '"', ':'][..]) {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
  } else {
    value.to_string()
  }
}

/// Render a filter list as query parameters.
pub fn filters_to_query(filters: &[Filter]) -> Vec<(String, String)> {
  filters.iter().map(Filter::to_param).collect()
}

/// A select against one table, with optional join expansion in `columns`
/// (e.g. `*, song:songs(*, artist:profiles(*))`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
  pub table: String,
  pub columns: String,
  pub filters: Vec<Filter>,
  pub order: Option<(String, Direction)>,
  pub limit: Option<usize>,
}

impl Select {
  /// Select all columns of `table`.
  pub fn table(table: &str) -> Self {
    Self {
      table: table.to_string(),
      columns: "*".to_string(),
      filters: Vec::new(),
      order: None,
      limit: None,
    }
  }

  pub fn columns(mut self, columns: &str) -> Self {
    self.columns = columns.to_string();
    self
  }

  pub fn filter(mut self, filter: Filter) -> Self {
    self.filters.push(filter);
    self
  }

  pub fn eq(self, column: &str, value: impl ToString) -> Self {
    self.filter(Filter::eq(column, value))
  }

  pub fn not_null(self, column: &str) -> Self {
    self.filter(Filter::not_null(column))
  }

  pub fn ilike(self, column: &str, pattern: impl ToString) -> Self {
    self.filter(Filter::ilike(column, pattern))
  }

  pub fn or(self, filters: Vec<Filter>) -> Self {
    self.filter(Filter::Or(filters))
  }

  pub fn order(mut self, column: &str, direction: Direction) -> Self {
    self.order = Some((column.to_string(), direction));
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Query parameters in request order: `select`, filters, `order`, `limit`.
  pub fn to_query(&self) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), self.columns.clone())];
    params.extend(filters_to_query(&self.filters));
    if let Some((column, direction)) = &self.order {
      params.push((
        "order".to_string(),
        format!("{}.{}", column, direction.as_str()),
      ));
    }
    if let Some(limit) = self.limit {
      params.push(("limit".to_string(), limit.to_string()));
    }
    params
  }
}
