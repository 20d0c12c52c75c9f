use crate::{Error, Patch};

/// The outcome of evaluating a single admission request.
///
/// `status` is rendered into the response's `status` field and `patch`, when
/// present, is sent as a JSON patch to be applied to the admitted object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub status: Option<Status>,
    pub patch: Option<Patch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub message: String,
}

// === impl Decision ===

impl Decision {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const FORBIDDEN: u16 = 403;

    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }

    pub fn deny(code: u16, message: impl ToString) -> Self {
        Self {
            allowed: false,
            status: Some(Status {
                code,
                message: message.to_string(),
            }),
            patch: None,
        }
    }

    pub fn patch(patch: Patch) -> Self {
        Self {
            allowed: true,
            status: None,
            patch: Some(patch),
        }
    }

    #[must_use]
    pub fn with_status(mut self, code: u16, message: impl ToString) -> Self {
        self.status = Some(Status {
            code,
            message: message.to_string(),
        });
        self
    }
}

impl From<Error> for Decision {
    fn from(error: Error) -> Self {
        Self::deny(Self::BAD_REQUEST, error)
    }
}
