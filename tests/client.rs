// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Client integration tests with wiremock.

use davsync::{
    Account, AccountType, AuthMethod, DavClient, DavConfig, DavError, DavRequest, ETag, Href,
    MkcalendarRequest, TimeRange,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> DavConfig {
    DavConfig {
        server_url: server.uri(),
        auth: AuthMethod::None,
        ..Default::default()
    }
}

fn caldav_account(home_url: &str) -> Account {
    Account {
        account_type: AccountType::CalDav,
        root_url: None,
        home_url: Some(home_url.to_string()),
    }
}

#[tokio::test]
#[ignore = "require network"]
async fn client_fetch_home_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/principals/user/"))
        .and(header("Depth", "0"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            r#"<?xml version="1.0" encoding="utf-8" ?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/principals/user/</d:href>
    <d:propstat>
      <d:prop>
        <c:calendar-home-set>
          <d:href>/dav/calendars/user/</d:href>
        </c:calendar-home-set>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#,
            "application/xml",
        ))
        .mount(&mock_server)
        .await;

    let account = Account {
        account_type: AccountType::CalDav,
        root_url: Some("/principals/user/".to_string()),
        home_url: None,
    };

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let home_url = client
        .fetch_home_url(&account)
        .await
        .expect("Failed to fetch home url");

    assert_eq!(
        home_url,
        format!("{}/dav/calendars/user/", mock_server.uri())
    );
}

#[tokio::test]
#[ignore = "require network"]
async fn client_fetch_home_url_requires_root_url() {
    let mock_server = MockServer::start().await;
    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");

    let result = client
        .fetch_home_url(&Account::new(AccountType::CalDav))
        .await;
    assert!(matches!(
        result,
        Err(DavError::MissingAccountField("root_url"))
    ));
}

#[tokio::test]
#[ignore = "require network"]
async fn client_fetch_calendars() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/dav/calendars/user/"))
        .and(header("Depth", "1"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            r#"<?xml version="1.0" encoding="utf-8" ?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" xmlns:cs="http://calendarserver.org/ns/">
  <d:response>
    <d:href>/dav/calendars/user/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/></d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/calendars/user/personal/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Personal Calendar</d:displayname>
        <d:resourcetype>
          <d:collection/>
          <c:calendar/>
        </d:resourcetype>
        <cs:getctag>ctag-41</cs:getctag>
        <d:sync-token>http://server/token/41</d:sync-token>
        <d:supported-report-set>
          <d:supported-report><d:report><d:sync-collection/></d:report></d:supported-report>
          <d:supported-report><d:report><c:calendar-multiget/></d:report></d:supported-report>
        </d:supported-report-set>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#,
            "application/xml",
        ))
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let calendars = client
        .fetch_calendars(&caldav_account("/dav/calendars/user/"))
        .await
        .expect("Failed to fetch calendars");

    assert_eq!(calendars.len(), 1);
    assert_eq!(
        calendars[0].url.as_str(),
        format!("{}/dav/calendars/user/personal/", mock_server.uri())
    );
    assert_eq!(
        calendars[0].display_name.as_deref(),
        Some("Personal Calendar")
    );
    assert_eq!(calendars[0].ctag.as_deref(), Some("ctag-41"));
    assert_eq!(
        calendars[0].sync_token.as_deref(),
        Some("http://server/token/41")
    );
    assert!(
        calendars[0]
            .reports
            .iter()
            .any(|r| r == "syncCollection")
    );
}

#[tokio::test]
#[ignore = "require network"]
async fn client_fetch_calendars_requires_home_url() {
    let mock_server = MockServer::start().await;
    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");

    let result = client
        .fetch_calendars(&Account::new(AccountType::CalDav))
        .await;
    assert!(matches!(
        result,
        Err(DavError::MissingAccountField("home_url"))
    ));
}

#[tokio::test]
#[ignore = "require network"]
async fn client_fetch_calendar_objects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/cal/personal/"))
        .and(header("Depth", "1"))
        .and(body_string_contains("calendar-query"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            "<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<d:multistatus xmlns:d=\"DAV:\" xmlns:c=\"urn:ietf:params:xml:ns:caldav\">
  <d:response>
    <d:href>/cal/personal/event1.ics</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>\"etag-1\"</d:getetag>
        <c:calendar-data>BEGIN:VCALENDAR
VERSION:2.0
END:VCALENDAR</c:calendar-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>",
            "application/xml",
        ))
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let objects = client
        .fetch_calendar_objects("/cal/personal/", None)
        .await
        .expect("Failed to fetch objects");

    assert_eq!(objects.len(), 1);
    assert_eq!(
        objects[0].url.as_str(),
        format!("{}/cal/personal/event1.ics", mock_server.uri())
    );
    assert_eq!(objects[0].etag.as_ref().map(ETag::as_str), Some("\"etag-1\""));
    assert!(objects[0].data.as_deref().unwrap().contains("BEGIN:VCALENDAR"));
}

#[tokio::test]
#[ignore = "require network"]
async fn client_query_with_time_range_sends_compiled_bounds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/cal/personal/"))
        .and(body_string_contains("start=\"20210501T000000Z\""))
        .and(body_string_contains("end=\"20210504T000000Z\""))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            "<d:multistatus xmlns:d=\"DAV:\"/>",
            "application/xml",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let range = TimeRange::new("2021-05-01", "2021-05-04").expect("valid range");
    let objects = client
        .fetch_calendar_objects("/cal/personal/", Some(&range))
        .await
        .expect("Failed to fetch objects");

    assert!(objects.is_empty());
}

#[tokio::test]
#[ignore = "require network"]
async fn client_empty_query_result_is_empty_list() {
    let mock_server = MockServer::start().await;

    // A 200 with no body at all still means "no matches", not a failure.
    Mock::given(method("REPORT"))
        .and(path("/cal/empty/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let objects = client
        .fetch_calendar_objects("/cal/empty/", None)
        .await
        .expect("Failed to fetch objects");

    assert!(objects.is_empty());
}

#[tokio::test]
#[ignore = "require network"]
async fn client_query_failure_status_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/cal/broken/"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let result = client.fetch_calendar_objects("/cal/broken/", None).await;

    match result {
        Err(DavError::QueryFailed { status, .. }) => assert_eq!(status, 400),
        other => panic!("expected QueryFailed, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "require network"]
async fn client_caller_content_type_replaces_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/cal/personal/"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            "<d:multistatus xmlns:d=\"DAV:\"/>",
            "application/xml",
        ))
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let url = format!("{}/cal/personal/", mock_server.uri());
    client
        .dav_request(
            &url,
            DavRequest::new("PROPFIND")
                .header("Content-Type", "application/xml; charset=utf-8"),
        )
        .await
        .expect("Failed to send request");

    // Content-Type is a singleton header; the caller's value must replace
    // the default, not be appended after it.
    let requests = mock_server
        .received_requests()
        .await
        .expect("recorded requests");
    let content_types: Vec<_> = requests[0].headers.get_all("content-type").iter().collect();
    assert_eq!(content_types.len(), 1);
    assert_eq!(
        content_types[0].to_str().unwrap(),
        "application/xml; charset=utf-8"
    );
}

#[tokio::test]
#[ignore = "require network"]
async fn client_basic_auth_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/cal/personal/"))
        .and(header("authorization", "Basic dXNlcjpwYXNz")) // base64 of "user:pass"
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            "<d:multistatus xmlns:d=\"DAV:\"/>",
            "application/xml",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = DavConfig {
        server_url: mock_server.uri(),
        auth: AuthMethod::Basic {
            username: "user".to_string(),
            password: "pass".to_string(),
        },
        ..Default::default()
    };
    let client = DavClient::new(config).expect("Failed to create client");
    client
        .fetch_calendar_objects("/cal/personal/", None)
        .await
        .expect("Failed to fetch objects");
}

#[tokio::test]
#[ignore = "require network"]
async fn client_mkcalendar() {
    let mock_server = MockServer::start().await;

    Mock::given(method("MKCALENDAR"))
        .and(path("/cal/new/"))
        .and(body_string_contains("<d:displayname>Team</d:displayname>"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let url = format!("{}/cal/new/", mock_server.uri());
    client
        .mkcalendar(&url, MkcalendarRequest::new().display_name("Team"))
        .await
        .expect("Failed to create calendar");
}

#[tokio::test]
#[ignore = "require network"]
async fn client_create_object_returns_etag() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/cal/personal/new.ics"))
        .and(header("Content-Type", "text/calendar"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("ETag", "\"new-etag\"")
                .set_body_string(""),
        )
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let etag = client
        .create_object(
            &Href::from("/cal/personal/new.ics"),
            "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n",
            "text/calendar",
        )
        .await
        .expect("Failed to create object");

    assert_eq!(etag.as_ref().map(ETag::as_str), Some("\"new-etag\""));
}

#[tokio::test]
#[ignore = "require network"]
async fn client_update_object_sends_if_match() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/cal/personal/event1.ics"))
        .and(header("if-match", "\"old-etag\""))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"new-etag\"")
                .set_body_string(""),
        )
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    let etag = client
        .update_object(
            &Href::from("/cal/personal/event1.ics"),
            &ETag::new("\"old-etag\"".to_string()),
            "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n",
            "text/calendar",
        )
        .await
        .expect("Failed to update object");

    assert_eq!(etag.as_ref().map(ETag::as_str), Some("\"new-etag\""));
}

#[tokio::test]
#[ignore = "require network"]
async fn client_delete_object() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/cal/personal/event1.ics"))
        .and(header("if-match", "\"some-etag\""))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = DavClient::new(config_for(&mock_server)).expect("Failed to create client");
    client
        .delete_object(
            &Href::from("/cal/personal/event1.ics"),
            Some(&ETag::new("\"some-etag\"".to_string())),
        )
        .await
        .expect("Failed to delete object");
}
