use thiserror::Error;

use crate::holder::HolderError;
use crate::services::LookupError;

type VariableName = String;
type KindName = String;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Variable \"{0}\" is not set")]
    UnsetVariable(VariableName),
    #[error("Unknown computation kind \"{0}\"")]
    UnknownComputationKind(KindName),
    #[error("Cyclic dependency detected while computing \"{0}\"")]
    CyclicDependency(VariableName),
    #[error("Missing parameter \"{param}\" for \"{kind}\"")]
    MissingParameter { kind: KindName, param: String },
    #[error("Invalid parameter \"{param}\" for \"{kind}\", expected {expected}")]
    InvalidParameter {
        kind: KindName,
        param: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Holder(#[from] HolderError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl Error {
    /// Returns `true` for errors caused by a misconfigured descriptor or
    /// dispatch table rather than by the data being filtered.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownComputationKind(_)
                | Error::MissingParameter { .. }
                | Error::InvalidParameter { .. }
                | Error::CyclicDependency(_)
        )
    }
}
