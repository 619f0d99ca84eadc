//! Erreurs UPnP portées par les SOAP Faults

/// Erreur d'action UPnP, encodée dans un SOAP Fault avec HTTP 500.
#[derive(Debug, Clone, thiserror::Error)]
#[error("UPnP error {code}: {description}")]
pub struct UpnpError {
    pub code: u32,
    pub description: String,
}

impl UpnpError {
    pub fn new(code: u32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// 401 Invalid Action
    pub fn invalid_action(detail: impl Into<String>) -> Self {
        Self::new(401, detail)
    }

    /// 402 Invalid Args
    pub fn invalid_args(detail: impl Into<String>) -> Self {
        Self::new(402, detail)
    }

    /// 501 Action Failed
    pub fn action_failed(detail: impl Into<String>) -> Self {
        Self::new(501, detail)
    }

    /// 701 No Such Object (ContentDirectory)
    pub fn no_such_object() -> Self {
        Self::new(701, "no such object")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(UpnpError::invalid_action("x").code, 401);
        assert_eq!(UpnpError::no_such_object().code, 701);
    }
}
