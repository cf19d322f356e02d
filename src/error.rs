//! Binary Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not prepare the digest store")]
    Feed,
    #[display("could not open the digest store")]
    Store,
    #[display("scan aborted")]
    Scan,
    #[display("interrupted")]
    Interrupted,
}
