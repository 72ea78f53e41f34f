//! Worker invocation against a mocked function API

use cdnlog_config::{CloudCredentials, ExecutionConfig, HttpConfig};
use cdnlog_core::{ErrorCode, WorkItem};
use cdnlog_upstream::ScfInvoker;
use httpmock::prelude::*;
use serde_json::json;

fn invoker_for(server: &MockServer) -> ScfInvoker {
    let execution = ExecutionConfig {
        worker_function: Some("cdnlog-worker".to_string()),
        invoke_endpoint: server.base_url(),
        ..ExecutionConfig::default()
    };
    ScfInvoker::new(
        &execution,
        "ap-guangzhou",
        CloudCredentials::new("AKIDexample", "secret", None),
        &HttpConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn invokes_worker_asynchronously() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/")
                .header("X-TC-Action", "Invoke")
                .header("X-TC-Version", "2018-04-16")
                .header("X-TC-Region", "ap-guangzhou")
                .json_body_partial(
                    r#"{"FunctionName":"cdnlog-worker","InvocationType":"Event","Namespace":"default","Qualifier":"$LATEST"}"#,
                )
                .body_contains("01-a.example.gz");
            then.status(200)
                .json_body(json!({"Response": {"Result": {"FunctionRequestId": "f-1"}, "RequestId": "req-1"}}));
        })
        .await;

    let item = WorkItem::new(
        "https://cdn/log/20240315/01/01-a.example.gz",
        "/cdnlog/a.example/20240315/01-a.example.gz",
    );
    let request_id = invoker_for(&server).invoke_async(&item).await.unwrap();

    assert_eq!(request_id, "req-1");
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn rejected_invocation_is_invoke_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).header("X-TC-Action", "Invoke");
            then.status(200).json_body(json!({"Response": {
                "Error": {"Code": "ResourceNotFound.Function", "Message": "no such function"},
                "RequestId": "req-2"
            }}));
        })
        .await;

    let item = WorkItem::new("https://cdn/log/20240315/01/01-a.example.gz?sign=secret", "");
    let err = invoker_for(&server).invoke_async(&item).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::E007InvokeFailed);
    assert!(!err.to_string().contains("sign=secret"));
}
