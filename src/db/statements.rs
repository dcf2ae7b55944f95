//! Named statements prepared on every store connection.

/// The store's named, parameterized operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Insert a user: `(username, password_hash)`.
    RegisterUser,
    /// Select the rows for a username: `(username)`.
    AuthenticateUser,
}

impl Statement {
    /// Every statement, in preparation order.
    pub const ALL: [Statement; 2] = [Statement::RegisterUser, Statement::AuthenticateUser];

    /// Statement name, as used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::RegisterUser => "register_user",
            Self::AuthenticateUser => "authenticate_user",
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Self::RegisterUser => {
                "INSERT INTO users (username, password_hash) VALUES (?1, ?2)"
            }
            Self::AuthenticateUser => {
                "SELECT username, password_hash FROM users WHERE username = ?1"
            }
        }
    }

    /// Number of bound parameters.
    pub fn arity(self) -> usize {
        match self {
            Self::RegisterUser => 2,
            Self::AuthenticateUser => 1,
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
