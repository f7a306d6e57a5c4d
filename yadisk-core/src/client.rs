use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net";
const RESOURCES_ENDPOINT: &str = "/v1/disk/resources";

/// Error code for operations whose parent folder is missing.
pub const ERROR_PARENT_MISSING: &str = "DiskPathDoesntExistsError";

#[derive(Debug, Error)]
pub enum YadiskError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("api response missing embedded items")]
    MissingEmbedded,
}

impl YadiskError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            YadiskError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// The machine-readable `error` field of an API error body, if any.
    pub fn error_code(&self) -> Option<String> {
        let YadiskError::Api { body, .. } = self else {
            return None;
        };
        serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderStatus {
    Created,
    AlreadyExists,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    /// The removal continues asynchronously; the link points at the operation.
    Accepted(TransferLink),
}

#[derive(Clone)]
pub struct YadiskClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl YadiskClient {
    pub fn new(token: impl Into<String>) -> Result<Self, YadiskError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, YadiskError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn get_disk_info(&self) -> Result<DiskInfo, YadiskError> {
        let url = self.endpoint("/v1/disk")?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Creates a folder. A conflict that reports an existing directory is
    /// folded into [`FolderStatus::AlreadyExists`]; a missing parent stays an error.
    pub async fn create_folder(&self, path: &str) -> Result<FolderStatus, YadiskError> {
        let mut url = self.endpoint(RESOURCES_ENDPOINT)?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .put(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(FolderStatus::Created),
            StatusCode::CONFLICT => {
                let err = Self::api_error(response).await;
                if err.error_code().as_deref() == Some(ERROR_PARENT_MISSING) {
                    Err(err)
                } else {
                    Ok(FolderStatus::AlreadyExists)
                }
            }
            _ => Err(Self::api_error(response).await),
        }
    }

    pub async fn list_directory_with_fields(
        &self,
        path: &str,
        limit: Option<u32>,
        offset: Option<u32>,
        fields: Option<&[&str]>,
    ) -> Result<ResourceList, YadiskError> {
        let mut url = self.endpoint(RESOURCES_ENDPOINT)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("path", path);
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(offset) = offset {
                query.append_pair("offset", &offset.to_string());
            }
            if let Some(fields) = fields.filter(|f| !f.is_empty()) {
                query.append_pair("fields", &fields.join(","));
            }
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let payload: ResourceListResponse = Self::handle_response(response).await?;
        payload.embedded.ok_or(YadiskError::MissingEmbedded)
    }

    pub async fn list_directory_all(
        &self,
        path: &str,
        page_size: u32,
        fields: Option<&[&str]>,
    ) -> Result<Vec<Resource>, YadiskError> {
        let page_size = page_size.max(1);
        let mut offset = 0u32;
        let mut items = Vec::new();
        loop {
            let page = self
                .list_directory_with_fields(path, Some(page_size), Some(offset), fields)
                .await?;
            let fetched = page.items.len() as u32;
            offset = offset.saturating_add(fetched);
            items.extend(page.items);
            if fetched == 0 || offset >= page.total {
                break;
            }
        }
        Ok(items)
    }

    pub async fn get_upload_link(
        &self,
        path: &str,
        overwrite: bool,
    ) -> Result<TransferLink, YadiskError> {
        let mut url = self.endpoint("/v1/disk/resources/upload")?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("overwrite", if overwrite { "true" } else { "false" });
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn delete_resource(
        &self,
        path: &str,
        permanently: bool,
    ) -> Result<DeleteStatus, YadiskError> {
        let mut url = self.endpoint(RESOURCES_ENDPOINT)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("path", path);
            if permanently {
                query.append_pair("permanently", "true");
            }
        }
        let response = self
            .http
            .delete(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        match response.status() {
            StatusCode::ACCEPTED => Ok(DeleteStatus::Accepted(
                Self::handle_response(response).await?,
            )),
            status if status.is_success() => Ok(DeleteStatus::Deleted),
            _ => Err(Self::api_error(response).await),
        }
    }

    fn auth_header_value(&self) -> String {
        format!("OAuth {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, YadiskError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, YadiskError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn api_error(response: Response) -> YadiskError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        YadiskError::Api { status, body }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DiskInfo {
    pub total_space: u64,
    pub used_space: u64,
    #[serde(default)]
    pub trash_size: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Resource {
    #[serde(default)]
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub md5: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Dir,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResourceList {
    pub items: Vec<Resource>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    pub total: u32,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResourceListResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<ResourceList>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TransferLink {
    pub href: Url,
    pub method: String,
    #[serde(default)]
    pub templated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_is_read_from_api_body() {
        let err = YadiskError::Api {
            status: StatusCode::CONFLICT,
            body: r#"{"message":"m","description":"d","error":"DiskPathDoesntExistsError"}"#
                .into(),
        };
        assert_eq!(err.error_code().as_deref(), Some(ERROR_PARENT_MISSING));
        assert!(!err.is_not_found());
    }

    #[test]
    fn error_code_is_none_for_non_json_body() {
        let err = YadiskError::Api {
            status: StatusCode::NOT_FOUND,
            body: "not json".into(),
        };
        assert_eq!(err.error_code(), None);
        assert!(err.is_not_found());
    }
}
