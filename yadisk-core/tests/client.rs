use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yadisk_core::{DeleteStatus, FolderStatus, ResourceType, YadiskClient};

#[tokio::test]
async fn get_disk_info_includes_oauth_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk"))
        .and(header("authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_space": 1024,
            "used_space": 256,
            "trash_size": 0
        })))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let info = client.get_disk_info().await.unwrap();

    assert_eq!(info.total_space, 1024);
    assert_eq!(info.used_space, 256);
}

#[tokio::test]
async fn create_folder_reports_created_on_201() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "Backup/Docs"))
        .and(header("authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "href": "https://cloud-api.yandex.net/v1/disk/resources?path=disk%3A%2FBackup%2FDocs",
            "method": "GET",
            "templated": false
        })))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let status = client.create_folder("Backup/Docs").await.unwrap();

    assert_eq!(status, FolderStatus::Created);
}

#[tokio::test]
async fn create_folder_treats_existing_directory_conflict_as_success() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "Backup"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "exists",
            "description": "exists",
            "error": "DiskPathPointsToExistentDirectoryError"
        })))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let status = client.create_folder("Backup").await.unwrap();

    assert_eq!(status, FolderStatus::AlreadyExists);
}

#[tokio::test]
async fn create_folder_fails_when_parent_is_missing() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "Backup/a/b"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "missing",
            "description": "missing",
            "error": "DiskPathDoesntExistsError"
        })))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client.create_folder("Backup/a/b").await.unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(409));
}

#[tokio::test]
async fn list_directory_returns_embedded_items() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "/Docs"))
        .and(query_param("limit", "2"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "limit": 2,
                "offset": 0,
                "total": 2,
                "items": [
                    {
                        "path": "/Docs/A.txt",
                        "name": "A.txt",
                        "type": "file",
                        "size": 1,
                        "md5": "0cc175b9c0f1b6a831c399e269772661"
                    },
                    {
                        "path": "/Docs/B",
                        "name": "B",
                        "type": "dir"
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let list = client
        .list_directory_with_fields("/Docs", Some(2), Some(0), None)
        .await
        .unwrap();

    assert_eq!(list.total, 2);
    assert_eq!(list.items.len(), 2);
    assert_eq!(
        list.items[0].md5.as_deref(),
        Some("0cc175b9c0f1b6a831c399e269772661")
    );
    assert_eq!(list.items[1].resource_type, ResourceType::Dir);
}

#[tokio::test]
async fn list_directory_all_follows_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "/Docs"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "total": 3,
                "items": [
                    { "name": "A.txt", "type": "file" },
                    { "name": "B.txt", "type": "file" }
                ]
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "/Docs"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "total": 3,
                "items": [
                    { "name": "C.txt", "type": "file" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let items = client.list_directory_all("/Docs", 2, None).await.unwrap();

    let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["A.txt", "B.txt", "C.txt"]);
}

#[tokio::test]
async fn list_directory_reports_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "DiskNotFoundError"
        })))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client
        .list_directory_all("/Missing", 100, None)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.error_code().as_deref(), Some("DiskNotFoundError"));
}

#[tokio::test]
async fn get_upload_link_sends_overwrite_flag() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources/upload"))
        .and(query_param("path", "/Docs/Hello.txt"))
        .and(query_param("overwrite", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": "https://upload.example/hello.txt",
            "method": "PUT",
            "templated": false
        })))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let link = client
        .get_upload_link("/Docs/Hello.txt", true)
        .await
        .unwrap();

    assert_eq!(link.href.as_str(), "https://upload.example/hello.txt");
    assert_eq!(link.method, "PUT");
}

#[tokio::test]
async fn delete_resource_reports_deleted_on_no_content() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "/Docs/Delete.txt"))
        .and(header("authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let status = client
        .delete_resource("/Docs/Delete.txt", false)
        .await
        .unwrap();

    assert_eq!(status, DeleteStatus::Deleted);
}

#[tokio::test]
async fn delete_resource_returns_operation_link_when_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "/Docs/Delete.txt"))
        .and(query_param("permanently", "true"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "href": "https://cloud-api.yandex.net/v1/disk/operations/3",
            "method": "GET",
            "templated": false
        })))
        .mount(&server)
        .await;

    let client = YadiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let status = client
        .delete_resource("/Docs/Delete.txt", true)
        .await
        .unwrap();

    let DeleteStatus::Accepted(link) = status else {
        panic!("expected accepted delete, got {status:?}");
    };
    assert_eq!(
        link.href.as_str(),
        "https://cloud-api.yandex.net/v1/disk/operations/3"
    );
}
