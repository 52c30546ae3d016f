#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use cnpj_pipeline::{EntityKind, PipelineConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use zip::write::SimpleFileOptions;

/// Configuration rooted in `dir` with progress output disabled
#[must_use]
pub fn test_config(dir: &Path, parts: usize) -> PipelineConfig {
    let mut config = PipelineConfig::with_data_dir(dir);
    config.parts = parts;
    config.show_progress = false;
    config
}

/// One raw row: quoted fields separated by `;`
#[must_use]
pub fn raw_row(fields: &[&str]) -> String {
    let quoted: Vec<String> = fields.iter().map(|f| format!("\"{f}\"")).collect();
    quoted.join(";")
}

/// Company row with the registry's 7 columns
#[must_use]
pub fn company_row(root_id: &str, name: &str, capital: &str) -> String {
    raw_row(&[root_id, name, "2062", "49", capital, "01", ""])
}

/// Establishment row with the registry's 30 columns
#[must_use]
pub fn branch_row(
    root_id: &str,
    order: &str,
    check: &str,
    headquarters: bool,
    name: &str,
    closing: &str,
    opening: &str,
    postal_code: &str,
) -> String {
    let mut fields = vec![""; 30];
    fields[0] = root_id;
    fields[1] = order;
    fields[2] = check;
    fields[3] = if headquarters { "1" } else { "2" };
    fields[4] = name;
    fields[5] = "02";
    fields[6] = closing;
    fields[10] = opening;
    fields[11] = "4781400";
    fields[18] = postal_code;
    fields[19] = "SP";
    raw_row(&fields)
}

/// Partnership row with the registry's 11 columns
#[must_use]
pub fn partner_row(root_id: &str, name: &str, start: &str) -> String {
    raw_row(&[root_id, "2", name, "***123456**", "49", start, "", "***000000**", "", "00", "4"])
}

/// Encode text as Latin-1, the registry's encoding
#[must_use]
pub fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Raw file contents for `rows`
#[must_use]
pub fn raw_file(rows: &[String]) -> Vec<u8> {
    let mut text = rows.join("\n");
    text.push('\n');
    latin1(&text)
}

/// Write one extracted raw file where the pipeline expects it
pub fn write_raw(config: &PipelineConfig, kind: EntityKind, part: usize, rows: &[String]) {
    let path = config.raw_path(kind, part);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, raw_file(rows)).unwrap();
}

/// Zip archive holding the given entries
#[must_use]
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    cursor.into_inner()
}

/// Minimal HTTP server answering `GET /<name>` from `files`, 404 otherwise
///
/// Returns the base URL, ending in `/`.
pub async fn serve(files: HashMap<String, Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let files = Arc::new(files);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let files = Arc::clone(&files);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&request);
                let path = head
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .trim_start_matches('/')
                    .to_string();

                let (status, body) = match files.get(&path) {
                    Some(body) => ("200 OK", body.clone()),
                    None => ("404 Not Found", Vec::new()),
                };
                let header = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(header.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}/")
}

/// Archives for every part of every dataset, keyed by served file name
#[must_use]
pub fn archives(parts: &[(EntityKind, usize, Vec<String>)]) -> HashMap<String, Vec<u8>> {
    parts
        .iter()
        .map(|(kind, part, rows)| {
            let entry = format!("K3241.{}{part}.CSV", kind.source_prefix().to_uppercase());
            (
                format!("{}{part}.zip", kind.source_prefix()),
                zip_bytes(&[(entry.as_str(), &raw_file(rows))]),
            )
        })
        .collect()
}
