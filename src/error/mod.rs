use log::warn;
use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};
use rocket::{http::Status, response::Responder};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("No election is currently configured")]
    NoActiveElection,
    #[error("The election is not currently accepting votes")]
    ElectionNotActive,
    #[error("This voter has already cast a ballot")]
    AlreadyVoted,
    #[error("Ballot is missing a selection for position '{0}'")]
    IncompleteBallot(String),
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
    #[error("Storage query timed out; retry the request")]
    StorageTimeout,
    #[error("Storage is unavailable; retry the request")]
    StorageUnavailable,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Did this database error come from a violated unique index?
    ///
    /// The (voter, election, position) index makes concurrent duplicate
    /// submissions fail here rather than racing the application check.
    pub fn is_duplicate_key(err: &DbError) -> bool {
        match &*err.kind {
            ErrorKind::Write(WriteFailure::WriteError(write_err)) => write_err.code == 11000,
            ErrorKind::BulkWrite(failure) => failure
                .write_errors
                .as_ref()
                .map_or(false, |errs| errs.iter().any(|e| e.code == 11000)),
            _ => false,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        warn!("Request failed: {self}");
        Err(match self {
            Self::Db(_) => Status::InternalServerError,
            Self::NoActiveElection | Self::NotFound(_) => Status::NotFound,
            Self::ElectionNotActive => Status::Forbidden,
            Self::AlreadyVoted => Status::Conflict,
            Self::IncompleteBallot(_) | Self::InvalidSelection(_) => Status::UnprocessableEntity,
            Self::StorageTimeout | Self::StorageUnavailable => Status::ServiceUnavailable,
            Self::BadRequest(_) => Status::BadRequest,
        })
    }
}
