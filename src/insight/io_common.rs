// Primitives shared by the readers: fetching a source and coercing cells.

use std::fs;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::insight::*;

const USER_AGENT: &str = concat!("pinsight/", env!("CARGO_PKG_VERSION"));

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reads a local file or fetches a URL, returning its text.
pub fn fetch_text(source: &str, timeout: Duration) -> InsightResult<String> {
    if is_remote(source) {
        info!("Fetching {}", source);
        fetch_remote(source, timeout)
    } else {
        debug!("fetch_text: reading local file {}", source);
        fs::read_to_string(source).context(OpeningFileSnafu { path: source })
    }
}

fn fetch_remote(url: &str, timeout: Duration) -> InsightResult<String> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context(FetchingSnafu { url })?;
    let resp = client.get(url).send().map_err(|e| transport_error(e, url))?;
    let status = resp.status();
    if !status.is_success() {
        return FetchStatusSnafu {
            url,
            status: status.as_u16(),
        }
        .fail();
    }
    resp.text().map_err(|e| transport_error(e, url))
}

fn transport_error(e: reqwest::Error, url: &str) -> InsightError {
    if e.is_timeout() {
        InsightError::FetchTimeout {
            url: url.to_string(),
        }
    } else {
        InsightError::Fetching {
            source: e,
            url: url.to_string(),
        }
    }
}

/// Coerces a cell to a count. Decimals are truncated; blanks and anything
/// unparseable count as 0.
pub fn coerce_count(cell: &str) -> u64 {
    let t = cell.trim();
    if t.is_empty() {
        return 0;
    }
    if let Ok(x) = t.parse::<u64>() {
        return x;
    }
    match t.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => f.trunc() as u64,
        _ => {
            debug!("coerce_count: cannot read {:?} as a count, using 0", cell);
            0
        }
    }
}

/// Capitalizes the first letter of every run of letters and lowercases the
/// rest: "ST. LOUIS" becomes "St. Louis".
pub fn title_case(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                res.extend(c.to_lowercase());
            } else {
                res.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            res.push(c);
            in_word = false;
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts() {
        assert_eq!(coerce_count(" 42 "), 42);
        assert_eq!(coerce_count("12.9"), 12);
        assert_eq!(coerce_count(""), 0);
        assert_eq!(coerce_count("n/a"), 0);
        assert_eq!(coerce_count("-3"), 0);
    }

    #[test]
    fn titles() {
        assert_eq!(title_case("ST. LOUIS"), "St. Louis");
        assert_eq!(title_case("LAC QUI PARLE"), "Lac Qui Parle");
        assert_eq!(title_case("MINNEAPOLIS W-1 P-10"), "Minneapolis W-1 P-10");
        assert_eq!(title_case("o'brien"), "O'Brien");
    }

    #[test]
    fn local_sources() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.txt");
        fs::write(&p, "hello").unwrap();
        let path = p.display().to_string();
        assert!(!is_remote(&path));
        assert!(is_remote("https://example.org/a.csv"));
        assert_eq!(fetch_text(&path, Duration::from_secs(1)).unwrap(), "hello");
        let missing = dir.path().join("b.txt").display().to_string();
        assert!(matches!(
            fetch_text(&missing, Duration::from_secs(1)),
            Err(InsightError::OpeningFile { .. })
        ));
    }

    /// Serves one connection on a loopback port with `respond`.
    fn serve_once<F>(respond: F) -> (String, std::thread::JoinHandle<()>)
    where
        F: FnOnce(std::net::TcpStream) + Send + 'static,
    {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/results.csv", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                respond(stream);
            }
        });
        (url, handle)
    }

    #[test]
    fn remote_status_error() {
        use std::io::{Read, Write};
        let (url, handle) = serve_once(|mut stream| {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        });
        let res = fetch_text(&url, Duration::from_secs(5));
        assert!(
            matches!(res, Err(InsightError::FetchStatus { status: 404, .. })),
            "{:?}",
            res
        );
        handle.join().unwrap();
    }

    #[test]
    fn remote_timeout() {
        let (url, handle) = serve_once(|stream| {
            std::thread::sleep(Duration::from_secs(2));
            drop(stream);
        });
        let res = fetch_text(&url, Duration::from_millis(300));
        assert!(
            matches!(res, Err(InsightError::FetchTimeout { .. })),
            "{:?}",
            res
        );
        handle.join().unwrap();
    }
}
