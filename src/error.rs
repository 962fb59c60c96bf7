/// One field-level form problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All problems found in one form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", summarize(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[cfg(test)]
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("database not initialized, run 'tracker init' first")]
    Uninitialized,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures reported by the authentication service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email already in use")]
    EmailAlreadyInUse,
    #[error("invalid email")]
    InvalidEmail,
    #[error("weak password")]
    WeakPassword,
    #[error("user not found")]
    UserNotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("no anonymous user to link")]
    NotAnonymous,
    #[error("not signed in")]
    NotSignedIn,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// The one message shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::EmailAlreadyInUse => {
                "This email is already registered. Please sign in instead."
            }
            AuthError::InvalidEmail => "Please enter a valid email address.",
            AuthError::WeakPassword => "Password is too weak. Please use at least 6 characters.",
            AuthError::UserNotFound => "No account found with this email. Please sign up first.",
            AuthError::WrongPassword => "Incorrect password. Please try again.",
            AuthError::InvalidCredential => "Invalid email or password. Please try again.",
            AuthError::NotAnonymous => "Only a guest account can be linked to an email.",
            AuthError::NotSignedIn => "You are not signed in. Run 'tracker login' first.",
            AuthError::Hash(_) | AuthError::Store(_) => "An error occurred. Please try again.",
        }
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::Store(StoreError::Sqlite(err))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{}", .0.user_message())]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
