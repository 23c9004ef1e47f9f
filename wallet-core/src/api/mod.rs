// Backend REST client
// Every call collapses into the uniform `{success, data?, error?}` shape

mod client;
pub mod transport;

pub use client::{
    AdvertisementUpdate, ApiClient, ConnectionReport, LoginReply, NewAdvertisement, NewSite,
    SiteUpdate,
};
#[cfg(feature = "client")]
pub use transport::ReqwestTransport;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured error code, when the backend supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            code: None,
        }
    }

    /// Success with a payload, or `None`
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self {
                success: false,
                data: None,
                code: e.code().map(str::to_string),
                error: Some(e.to_string()),
            },
        }
    }
}
