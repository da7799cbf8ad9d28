use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::FlagError;
use crate::flag_matching::EvaluationContext;

#[derive(Default, Debug, Deserialize, Serialize)]
pub struct FlagRequest {
    #[serde(
        alias = "$token",
        alias = "api_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<String>,
    #[serde(
        alias = "$distinct_id",
        alias = "userId",
        skip_serializing_if = "Option::is_none"
    )]
    pub distinct_id: Option<String>,
}

impl FlagRequest {
    /// Takes a request payload and tries to unmarshall it.
    #[instrument(skip_all)]
    pub fn from_bytes(bytes: Bytes) -> Result<FlagRequest, FlagError> {
        tracing::debug!(len = bytes.len(), "decoding new request");
        let payload = String::from_utf8(bytes.into()).map_err(|e| {
            tracing::error!("failed to decode body: {}", e);
            FlagError::RequestDecodingError(String::from("invalid body encoding"))
        })?;

        tracing::debug!(json = payload, "decoded event data");
        Ok(serde_json::from_str::<FlagRequest>(&payload)?)
    }

    pub fn extract_token(&self) -> Result<String, FlagError> {
        match &self.token {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(FlagError::NoTokenError),
        }
    }

    pub fn extract_context(&self) -> Result<EvaluationContext, FlagError> {
        match &self.distinct_id {
            None => Err(FlagError::MissingDistinctId),
            Some(distinct_id) if distinct_id.is_empty() => Err(FlagError::EmptyDistinctId),
            Some(distinct_id) => Ok(EvaluationContext::new(distinct_id.as_str())?),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(body: serde_json::Value) -> FlagRequest {
        FlagRequest::from_bytes(Bytes::from(body.to_string())).unwrap()
    }

    #[test]
    fn test_accepts_sdk_field_aliases() {
        let request = parse(json!({"$token": "hog_live_abc", "$distinct_id": "user_1"}));
        assert_eq!(request.extract_token().unwrap(), "hog_live_abc");
        assert_eq!(request.extract_context().unwrap().user_id, "user_1");

        let request = parse(json!({"api_key": "hog_live_abc", "userId": "user_2"}));
        assert_eq!(request.extract_token().unwrap(), "hog_live_abc");
        assert_eq!(request.extract_context().unwrap().user_id, "user_2");
    }

    #[test]
    fn test_missing_token() {
        let request = parse(json!({"distinct_id": "user_1"}));
        assert!(matches!(
            request.extract_token(),
            Err(FlagError::NoTokenError)
        ));
    }

    #[test]
    fn test_missing_and_empty_distinct_id() {
        let request = parse(json!({"token": "hog_live_abc"}));
        assert!(matches!(
            request.extract_context(),
            Err(FlagError::MissingDistinctId)
        ));

        let request = parse(json!({"token": "hog_live_abc", "distinct_id": ""}));
        assert!(matches!(
            request.extract_context(),
            Err(FlagError::EmptyDistinctId)
        ));
    }

    #[test]
    fn test_invalid_utf8_body() {
        let body = Bytes::from_static(&[0xff, 0xfe, 0x00]);
        assert!(matches!(
            FlagRequest::from_bytes(body),
            Err(FlagError::RequestDecodingError(_))
        ));
    }

    #[test]
    fn test_invalid_json_body() {
        let body = Bytes::from_static(b"{\"token\": ");
        assert!(matches!(
            FlagRequest::from_bytes(body),
            Err(FlagError::RequestParsingError(_))
        ));
    }
}
