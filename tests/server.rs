use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use assert_matches::assert_matches;

use crema_upload::domain::{ByteRange, DataType, JobParameters, Organism, SessionId};
use crema_upload::error::UploadError;
use crema_upload::server::{ChunkUpload, ClientConfig, CremaHttpClient, CremaServer};

/// Accepts a single request on a loopback port, answers it with `status` and
/// `body`, and hands back the raw request text.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        String::from_utf8_lossy(&request).into_owned()
    });
    (url, handle)
}

fn read_request(stream: &mut impl Read) -> Vec<u8> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let read = stream.read(&mut buf).unwrap();
        assert!(read > 0, "connection closed before headers were complete");
        request.extend_from_slice(&buf[..read]);
        if let Some(pos) = find(&request, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
    let content_length = head.lines().find_map(|line| {
        line.strip_prefix("content-length:")
            .and_then(|value| value.trim().parse::<usize>().ok())
    });
    let chunked = head.contains("transfer-encoding: chunked");

    loop {
        let body = &request[header_end..];
        let done = match content_length {
            Some(len) => body.len() >= len,
            None if chunked => find(body, b"0\r\n\r\n").is_some(),
            None => true,
        };
        if done {
            break;
        }
        let read = stream.read(&mut buf).unwrap();
        if read == 0 {
            break;
        }
        request.extend_from_slice(&buf[..read]);
    }
    request
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn client_for(url: &str) -> CremaHttpClient {
    let config = ClientConfig {
        base_url: url.to_string(),
        session_url: url.to_string(),
        connect_timeout: Duration::from_secs(5),
        timeout: Duration::from_secs(10),
        verify_tls: true,
    };
    CremaHttpClient::new(&config).unwrap()
}

fn session() -> SessionId {
    "SD77".parse().unwrap()
}

fn parameters() -> JobParameters {
    JobParameters::new(
        "a@b".to_string(),
        "pr".to_string(),
        Organism::Rn6,
        DataType::AtacSeq,
    )
}

#[test]
fn get_sd_takes_first_line_of_body() {
    let (url, handle) = serve_once("200 OK", "SD77\nextra\n");
    let id = client_for(&url).allocate_session().unwrap();
    let request = handle.join().unwrap();

    assert_eq!(id.as_str(), "SD77");
    assert!(request.starts_with("GET /get_sd HTTP/1.1\r\n"), "{request}");
    assert!(
        request
            .to_lowercase()
            .contains(&format!("user-agent: crema-upload/{}", env!("CARGO_PKG_VERSION"))),
        "{request}"
    );
}

#[test]
fn save_json_posts_session_and_encoded_parameters() {
    let (url, handle) = serve_once("200 OK", "");
    client_for(&url)
        .save_parameters(&session(), &parameters())
        .unwrap();
    let request = handle.join().unwrap();

    assert!(request.starts_with("POST /save_json HTTP/1.1\r\n"), "{request}");
    assert!(
        request
            .to_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"),
        "{request}"
    );
    let body = request.split("\r\n\r\n").nth(1).unwrap_or_default();
    assert!(body.starts_with("sd=SD77&data="), "{body}");
    for key in ["email", "project", "organism", "datatype", "submission"] {
        assert!(body.contains(&format!("%22{key}%22")), "{key} missing: {body}");
    }
    assert!(body.contains("a%40b"), "{body}");
    assert!(body.contains("%22uploader%22"), "{body}");
}

#[test]
fn upload_sends_multipart_chunk_with_content_range() {
    let (url, handle) = serve_once("200 OK", "");
    let chunk = ChunkUpload {
        file_name: "r1.fq.gz",
        range: ByteRange {
            start: 0,
            end: 4,
            total: 10,
        },
        data: b"ACGT",
    };
    client_for(&url).upload_chunk(&session(), &chunk).unwrap();
    let request = handle.join().unwrap();
    let lower = request.to_lowercase();

    assert!(request.starts_with("POST /upload HTTP/1.1\r\n"), "{request}");
    assert!(lower.contains("content-range: bytes 0-4/10\r\n"), "{request}");
    assert!(lower.contains("content-type: multipart/form-data; boundary="), "{request}");
    assert!(request.contains("name=\"sd\"\r\n\r\nSD77\r\n"), "{request}");
    assert!(
        request.contains("name=\"files[]\"; filename=\"r1.fq.gz\""),
        "{request}"
    );
    assert!(lower.contains("content-type: application/octet-stream"), "{request}");
    assert!(request.contains("\r\n\r\nACGT\r\n"), "{request}");
}

#[test]
fn run_posts_job_form_and_returns_link_text() {
    let (url, handle) = serve_once("200 OK", "https://crema.example/results/SD77\n");
    let link = client_for(&url).run_job(&session(), &parameters()).unwrap();
    let request = handle.join().unwrap();

    assert_eq!(link, "https://crema.example/results/SD77\n");
    assert!(request.starts_with("POST /run HTTP/1.1\r\n"), "{request}");
    let body = request.split("\r\n\r\n").nth(1).unwrap_or_default();
    assert_eq!(
        body,
        "sd=SD77&email=a%40b&project=pr&method=crema_uploader&datatype=atac-seq&organism=rn6"
    );
}

#[test]
fn error_status_carries_endpoint_and_body() {
    let (url, handle) = serve_once("503 Service Unavailable", "maintenance");
    let err = client_for(&url).allocate_session().unwrap_err();
    handle.join().unwrap();

    assert_matches!(
        err,
        UploadError::Status { ref endpoint, status: 503, ref message }
            if endpoint == "get_sd" && message == "maintenance"
    );
    assert!(err.is_remote());
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client_for(&url).allocate_session().unwrap_err();
    assert_matches!(err, UploadError::Transport { ref endpoint, .. } if endpoint == "get_sd");
}
