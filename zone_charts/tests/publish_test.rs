use std::{
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    thread,
};

use secrecy::SecretString;
use zone_charts::{
    PublishError,
    naming::OutputKind,
    publish::{BlobContainer, Publisher},
};

struct Captured {
    request_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Accept one request, answer with `status`, hand back what was received.
fn serve_once(status: &'static str) -> (u16, thread::JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let (k, v) = line.split_once(':').unwrap();
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
        let len: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.parse().unwrap())
            .unwrap_or(0);
        let mut body = vec![0; len];
        reader.read_exact(&mut body).unwrap();

        let mut stream = stream;
        write!(stream, "HTTP/1.1 {status}\r\nContent-Length: 6\r\nConnection: close\r\n\r\nnope!\n").unwrap();
        stream.flush().unwrap();

        Captured {
            request_line: request_line.trim_end().to_string(),
            headers,
            body,
        }
    });
    (port, handle)
}

#[test]
fn upload_is_a_block_blob_put_and_returns_the_bare_url() {
    let (port, server) = serve_once("201 Created");
    let sas = SecretString::from(format!("http://127.0.0.1:{port}/?sv=2024&sig=secret"));
    let container = BlobContainer::new(&sas, "trading-charts").unwrap();

    let location = container
        .publish(b"<html>chart</html>", "AAPL_demand_30min_20250115_143000", OutputKind::Html)
        .unwrap();

    assert_eq!(
        location,
        format!("http://127.0.0.1:{port}/trading-charts/AAPL_demand_30min_20250115_143000.html")
    );
    let captured = server.join().unwrap();
    assert_eq!(
        captured.request_line,
        "PUT /trading-charts/AAPL_demand_30min_20250115_143000.html?sv=2024&sig=secret HTTP/1.1"
    );
    assert_eq!(captured.header("x-ms-blob-type"), Some("BlockBlob"));
    assert_eq!(captured.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(captured.body, b"<html>chart</html>");
}

#[test]
fn non_success_status_is_rejected_without_leaking_the_sas() {
    let (port, server) = serve_once("403 Forbidden");
    let sas = SecretString::from(format!("http://127.0.0.1:{port}/charts?sig=secret"));
    let container = BlobContainer::new(&sas, "ignored").unwrap();

    let err = container.publish(&[0x89, b'P', b'N', b'G'], "x", OutputKind::Png).unwrap_err();

    match &err {
        PublishError::Rejected { name, status, .. } => {
            assert_eq!(name, "x.png");
            assert_eq!(*status, 403);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.to_string().contains("secret"));
    let captured = server.join().unwrap();
    assert!(captured.request_line.starts_with("PUT /charts/x.png?"));
    assert_eq!(captured.header("content-type"), Some("image/png"));
}
