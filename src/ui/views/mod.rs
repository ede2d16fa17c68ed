mod account;
mod library;
mod password;
mod search;

pub use account::AccountView;
pub use library::LibraryView;
pub use password::PasswordView;
pub use search::SearchView;
